//! GeoSphere Austria weather warnings for wetterwarn.
//!
//! Fetches warning polygons for the home zone and any extra points, merges
//! them and keeps warnings visible for a grace period after upstream drops
//! them or their end time passes.

pub mod cache;
pub mod client;
pub mod coordinator;
pub mod coords;
pub mod error;
pub mod grace;
pub mod key;
pub mod types;

pub use cache::{CacheEntry, WarningCache};
pub use client::{FetchOutcome, PointFetch, WarningClient};
pub use coordinator::{CoordinatorReport, CoordinatorStatus, Snapshot, WarningCoordinator, ZoneProvider};
pub use coords::{parse_extra_coords, resolve_points, HOME_ZONE};
pub use error::{FetchError, UpdateFailed};
pub use grace::extend_if_grace_applies;
pub use key::WarningKey;
pub use types::*;
