//! Warning-service error types.

use thiserror::Error;
use wetterwarn_core::NetworkError;

/// Failure of a single per-coordinate request.
///
/// Never escapes the fetch engine; it ends up as one diagnostic line.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Network(#[from] NetworkError),

    #[error("Invalid response body: {0}")]
    Parse(String),
}

impl FetchError {
    /// User-friendly description of the failure for logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Status { status, .. } if *status >= 500 => {
                "The warning service is experiencing issues. Please try again later."
            }
            Self::Status { .. } => "The warning service rejected the request.",
            Self::Network(e) => e.user_message(),
            Self::Parse(_) => "Received an unexpected response from the warning service.",
        }
    }

    /// Whether the next cycle could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Network(e) => e.is_transient(),
            Self::Parse(_) => false,
        }
    }
}

/// Why an update cycle produced no result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateFailed {
    #[error("zone.home not found")]
    ZoneNotFound,

    #[error("zone.home has no coordinates")]
    MissingCoordinates,

    #[error("zone.home has invalid coordinates")]
    InvalidCoordinates,

    #[error("no coordinates to query")]
    NoCoordinates,

    #[error("Error fetching data: all requests failed")]
    AllRequestsFailed,
}

impl UpdateFailed {
    /// User-friendly error message for status display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ZoneNotFound => "The home zone is not configured.",
            Self::MissingCoordinates | Self::InvalidCoordinates => {
                "The home zone has no usable latitude/longitude."
            }
            Self::NoCoordinates => "There is no location to query warnings for.",
            Self::AllRequestsFailed => "The warning service could not be reached.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_matches_diagnostic_format() {
        let err = FetchError::Status {
            status: 502,
            body: "Bad Gateway".into(),
        };
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway");
        assert!(err.is_transient());
        assert!(err.user_message().contains("experiencing issues"));

        let rejected = FetchError::Status {
            status: 404,
            body: "Not Found".into(),
        };
        assert!(!rejected.is_transient());
        assert!(rejected.user_message().contains("rejected"));
    }

    #[test]
    fn test_network_error_passes_through() {
        let err = FetchError::from(NetworkError::Timeout);
        assert_eq!(err.to_string(), "Request timed out");
        assert!(err.is_transient());
        assert_eq!(err.user_message(), NetworkError::Timeout.user_message());
        assert!(!FetchError::Parse("eof".into()).is_transient());
    }

    #[test]
    fn test_update_failed_messages() {
        assert_eq!(UpdateFailed::ZoneNotFound.to_string(), "zone.home not found");
        assert!(UpdateFailed::InvalidCoordinates.user_message().contains("latitude"));
    }
}
