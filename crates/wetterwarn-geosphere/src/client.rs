//! GeoSphere warning service client.

use std::time::Duration;

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use tracing::instrument;
use wetterwarn_core::ReqwestErrorExt;

use crate::error::FetchError;
use crate::types::{GeoPoint, Warning, WarningCollection};

const LANGUAGE: &str = "de";
const USER_AGENT: &str = concat!("wetterwarn/", env!("CARGO_PKG_VERSION"));

/// Result of querying one point.
#[derive(Debug)]
pub struct PointFetch {
    pub point: GeoPoint,
    /// Status of the response, if one arrived
    pub status: Option<u16>,
    pub result: Result<Vec<Warning>, FetchError>,
}

/// Merged result of querying every point of a cycle.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Warnings in point order, upstream order within a point
    pub warnings: Vec<Warning>,
    pub any_success: bool,
    /// Highest status seen across all points
    pub http_status: Option<u16>,
    /// One `"<lat>,<lon>: <reason>"` line per failed point
    pub errors: Vec<String>,
}

impl FetchOutcome {
    pub fn merge(fetches: Vec<PointFetch>) -> Self {
        let mut outcome = Self::default();

        for fetch in fetches {
            if let Some(status) = fetch.status {
                outcome.http_status = Some(outcome.http_status.map_or(status, |max| max.max(status)));
            }
            match fetch.result {
                Ok(warnings) => {
                    outcome.any_success = true;
                    outcome.warnings.extend(warnings);
                }
                Err(err) => outcome.errors.push(format!("{}: {}", fetch.point, err)),
            }
        }

        if outcome.http_status.is_none() && outcome.any_success {
            outcome.http_status = Some(StatusCode::OK.as_u16());
        }
        outcome
    }

    pub fn had_partial_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Diagnostics joined for display, `None` when every point succeeded.
    pub fn error_text(&self) -> Option<String> {
        (!self.errors.is_empty()).then(|| self.errors.join("; "))
    }
}

#[derive(Debug, Clone)]
pub struct WarningClient {
    client: Client,
    base_url: String,
}

impl WarningClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Query one point. Failures are returned, never raised.
    #[instrument(skip(self, point), fields(point = %point), level = "debug")]
    pub async fn fetch_point(&self, point: GeoPoint) -> PointFetch {
        let response = match self
            .client
            .get(&self.base_url)
            .query(&[("lon", point.longitude), ("lat", point.latitude)])
            .query(&[("lang", LANGUAGE)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return PointFetch {
                    point,
                    status: None,
                    result: Err(FetchError::Network(e.into_network_error())),
                }
            }
        };

        let status = response.status();
        let result = if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            Err(FetchError::Status {
                status: status.as_u16(),
                body,
            })
        } else {
            match response.bytes().await {
                Ok(bytes) => serde_json::from_slice::<WarningCollection>(&bytes)
                    .map(WarningCollection::into_warnings)
                    .map_err(|e| FetchError::Parse(e.to_string())),
                Err(e) => Err(FetchError::Network(e.into_network_error())),
            }
        };

        PointFetch {
            point,
            status: Some(status.as_u16()),
            result,
        }
    }

    /// Query every point concurrently and merge the results.
    ///
    /// A failing point never cancels or skips the others.
    #[instrument(skip(self, points), fields(points = points.len()), level = "debug")]
    pub async fn fetch_all(&self, points: &[GeoPoint]) -> FetchOutcome {
        let fetches = join_all(points.iter().map(|point| self.fetch_point(*point))).await;

        for fetch in &fetches {
            match &fetch.result {
                Ok(warnings) => tracing::debug!(
                    "{} returned {} warning(s)",
                    fetch.point,
                    warnings.len()
                ),
                Err(e) => tracing::warn!(
                    transient = e.is_transient(),
                    "Fetching warnings for {} failed: {} ({})",
                    fetch.point,
                    e,
                    e.user_message()
                ),
            }
        }

        FetchOutcome::merge(fetches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VIENNA: GeoPoint = GeoPoint {
        latitude: 48.2,
        longitude: 16.37,
    };
    const GRAZ: GeoPoint = GeoPoint {
        latitude: 47.07,
        longitude: 15.44,
    };

    fn client_for(server: &MockServer) -> WarningClient {
        WarningClient::new(&format!("{}/warnings", server.uri()), Duration::from_secs(2)).unwrap()
    }

    fn body(ids: &[&str]) -> serde_json::Value {
        let warnings: Vec<_> = ids
            .iter()
            .map(|id| json!({"type": "Feature", "properties": {"rawinfo": {"id": id, "end": 1700003600}}}))
            .collect();
        json!({"type": "FeatureCollection", "properties": {"warnings": warnings}})
    }

    #[tokio::test]
    async fn test_fetch_point_sends_query() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/warnings"))
            .and(query_param("lat", "48.2"))
            .and(query_param("lon", "16.37"))
            .and(query_param("lang", "de"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(&["a", "b"])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetch = client_for(&mock_server).fetch_point(VIENNA).await;

        assert_eq!(fetch.status, Some(200));
        let warnings = fetch.result.unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[1].rawinfo().id, Some(json!("b")));
    }

    #[tokio::test]
    async fn test_fetch_point_non_200_keeps_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/warnings"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let fetch = client_for(&mock_server).fetch_point(VIENNA).await;

        assert_eq!(fetch.status, Some(503));
        let err = fetch.result.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503 maintenance");
    }

    #[tokio::test]
    async fn test_fetch_point_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/warnings"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let fetch = client_for(&mock_server).fetch_point(VIENNA).await;

        assert_eq!(fetch.status, Some(200));
        assert!(matches!(fetch.result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_fetch_point_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/warnings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(body(&["late"]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = WarningClient::new(
            &format!("{}/warnings", mock_server.uri()),
            Duration::from_millis(200),
        )
        .unwrap();
        let fetch = client.fetch_point(VIENNA).await;

        assert_eq!(fetch.status, None);
        assert!(matches!(fetch.result, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_fetch_all_isolates_failures() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/warnings"))
            .and(query_param("lat", "48.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(&["vienna"])))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/warnings"))
            .and(query_param("lat", "47.07"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server).fetch_all(&[GRAZ, VIENNA]).await;

        assert!(outcome.any_success);
        assert!(outcome.had_partial_failure());
        assert_eq!(outcome.http_status, Some(500));
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.error_text().as_deref(), Some("47.07,15.44: HTTP 500 boom"));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_point_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("lat", "48.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(&["v1", "v2"])))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("lat", "47.07"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(&["g1", "v1"])))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server).fetch_all(&[VIENNA, GRAZ]).await;

        let ids: Vec<_> = outcome
            .warnings
            .iter()
            .map(|w| w.rawinfo().id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec![json!("v1"), json!("v2"), json!("g1"), json!("v1")]);
        assert!(!outcome.had_partial_failure());
        assert_eq!(outcome.error_text(), None);
    }

    #[test]
    fn test_merge_without_any_response() {
        let outcome = FetchOutcome::merge(vec![PointFetch {
            point: VIENNA,
            status: None,
            result: Err(FetchError::Network(wetterwarn_core::NetworkError::Timeout)),
        }]);

        assert!(!outcome.any_success);
        assert_eq!(outcome.http_status, None);
        assert_eq!(outcome.errors, vec!["48.2,16.37: Request timed out".to_string()]);
    }

    #[test]
    fn test_merge_success_without_status_defaults_to_ok() {
        let outcome = FetchOutcome::merge(vec![PointFetch {
            point: VIENNA,
            status: None,
            result: Ok(Vec::new()),
        }]);

        assert!(outcome.any_success);
        assert_eq!(outcome.http_status, Some(200));
    }
}
