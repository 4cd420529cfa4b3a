//! Periodic update cycle for GeoSphere warnings.
//!
//! One cycle resolves the query points, fetches every point, reconciles the
//! result against the warning cache and records the outcome. `refresh` takes
//! `&mut self`, so a coordinator cannot run two cycles at once; the caller
//! only needs to drive it from a single task. Cache and snapshots are touched
//! only after all fetches have returned, so dropping a cycle mid-fetch leaves
//! them as they were.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use wetterwarn_core::{EntrySettings, SettingsLayer};

use crate::cache::WarningCache;
use crate::client::WarningClient;
use crate::coords::{resolve_points, HOME_ZONE};
use crate::error::UpdateFailed;
use crate::types::{WarningCollection, ZoneState};

/// Source of zone entity state.
pub trait ZoneProvider: Send + Sync {
    fn zone(&self, entity_id: &str) -> Option<ZoneState>;
}

impl ZoneProvider for HashMap<String, ZoneState> {
    fn zone(&self, entity_id: &str) -> Option<ZoneState> {
        self.get(entity_id).cloned()
    }
}

/// Health of the most recent cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoordinatorStatus {
    /// Highest HTTP status seen, `None` when no response arrived
    pub last_http_status: Option<u16>,
    /// `"; "`-joined per-point diagnostics, or the reason a cycle aborted
    pub last_error: Option<String>,
    pub had_partial_failure: bool,
    pub last_request: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub data: WarningCollection,
    pub taken_at: DateTime<Utc>,
}

/// Everything a presentation layer may want to show.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorReport {
    pub status: CoordinatorStatus,
    pub data: Option<WarningCollection>,
    pub last_non_empty: Option<Snapshot>,
}

pub struct WarningCoordinator<Z> {
    client: WarningClient,
    zones: Z,
    settings: EntrySettings,
    update_interval: Duration,
    status: CoordinatorStatus,
    cache: WarningCache,
    last_successful: Option<WarningCollection>,
    last_non_empty: Option<Snapshot>,
}

impl<Z: ZoneProvider> WarningCoordinator<Z> {
    pub fn new(client: WarningClient, zones: Z, settings: EntrySettings) -> Self {
        let update_interval = Duration::from_secs(settings.scan_interval());
        Self {
            client,
            zones,
            settings,
            update_interval,
            status: CoordinatorStatus::default(),
            cache: WarningCache::new(),
            last_successful: None,
            last_non_empty: None,
        }
    }

    pub fn status(&self) -> &CoordinatorStatus {
        &self.status
    }

    /// Result of the last cycle that had at least one successful fetch.
    pub fn data(&self) -> Option<&WarningCollection> {
        self.last_successful.as_ref()
    }

    pub fn last_non_empty(&self) -> Option<&Snapshot> {
        self.last_non_empty.as_ref()
    }

    pub fn cache(&self) -> &WarningCache {
        &self.cache
    }

    pub fn settings(&self) -> &EntrySettings {
        &self.settings
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn set_update_interval(&mut self, seconds: u64) {
        self.update_interval = Duration::from_secs(seconds);
    }

    /// Replace the live options; the next cycle uses them.
    pub fn update_options(&mut self, options: SettingsLayer) {
        self.settings.options = options;
        self.set_update_interval(self.settings.scan_interval());
    }

    pub fn report(&self) -> CoordinatorReport {
        CoordinatorReport {
            status: self.status.clone(),
            data: self.last_successful.clone(),
            last_non_empty: self.last_non_empty.clone(),
        }
    }

    pub async fn refresh(&mut self) -> Result<WarningCollection, UpdateFailed> {
        self.refresh_at(Utc::now()).await
    }

    /// Run one update cycle as of `now`.
    ///
    /// When every fetch fails the last successful result is returned again;
    /// an error is only reported when there is nothing to fall back to.
    #[instrument(skip(self), level = "info")]
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> Result<WarningCollection, UpdateFailed> {
        self.status.last_request = Some(now);
        let grace_seconds = self.settings.grace_period();

        let zone = self.zones.zone(HOME_ZONE);
        let points = match resolve_points(zone.as_ref(), self.settings.extra_coords()) {
            Ok(points) => points,
            Err(err) => {
                tracing::error!("Update aborted: {}", err);
                self.status.last_http_status = None;
                self.status.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let outcome = self.client.fetch_all(&points).await;
        self.status.had_partial_failure = outcome.had_partial_failure();
        self.status.last_http_status = outcome.http_status;
        self.status.last_error = outcome.error_text();

        if outcome.any_success {
            let warnings = self
                .cache
                .reconcile(outcome.warnings, now.timestamp(), grace_seconds);
            let result = WarningCollection::new(warnings);

            tracing::info!(
                "Fetched {} point(s): {} warning(s) visible, {} cached",
                points.len(),
                result.warnings().len(),
                self.cache.len()
            );

            self.last_successful = Some(result.clone());
            if !result.is_empty() {
                self.last_non_empty = Some(Snapshot {
                    data: result.clone(),
                    taken_at: now,
                });
            }
            return Ok(result);
        }

        if let Some(previous) = &self.last_successful {
            tracing::warn!("All {} request(s) failed, keeping previous result", points.len());
            return Ok(previous.clone());
        }

        tracing::error!("All {} request(s) failed and there is no previous result", points.len());
        Err(UpdateFailed::AllRequestsFailed)
    }
}
