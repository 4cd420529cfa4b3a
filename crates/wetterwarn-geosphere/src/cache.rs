//! In-memory cache of warnings seen in earlier cycles.
//!
//! Owned by a single coordinator and only touched from inside an update cycle,
//! which the scheduler must never run concurrently with itself.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::grace::extend_if_grace_applies;
use crate::key::WarningKey;
use crate::types::Warning;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Last upstream version of the warning, never grace-extended
    pub warning: Warning,
    pub last_seen_ts: Option<i64>,
}

#[derive(Debug, Default)]
pub struct WarningCache {
    entries: IndexMap<WarningKey, CacheEntry>,
}

impl WarningCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &WarningKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &WarningKey> {
        self.entries.keys()
    }

    /// Merge this cycle's warnings into the cache and build the visible list.
    ///
    /// Fresh warnings come first (grace-extended where they are past their
    /// end), followed by cached warnings upstream stopped reporting that are
    /// still inside the grace window, in first-seen order. Entries that fall
    /// out of the window are evicted.
    pub fn reconcile(&mut self, fresh: Vec<Warning>, now: i64, grace_seconds: i64) -> Vec<Warning> {
        let mut seen = HashSet::with_capacity(fresh.len());
        let mut visible = Vec::with_capacity(fresh.len());

        for warning in fresh {
            let key = WarningKey::derive(&warning);
            if let Some(passed) = extend_if_grace_applies(&warning, now, grace_seconds, true) {
                visible.push(passed.into_owned());
            }
            self.entries.insert(
                key.clone(),
                CacheEntry {
                    warning,
                    last_seen_ts: Some(now),
                },
            );
            seen.insert(key);
        }

        let mut expired = Vec::new();
        for (key, entry) in &self.entries {
            if seen.contains(key) {
                continue;
            }
            let last_seen = match entry.last_seen_ts {
                Some(ts) if ts != 0 && grace_seconds > 0 => ts,
                _ => {
                    expired.push(key.clone());
                    continue;
                }
            };
            if now.saturating_sub(last_seen) > grace_seconds {
                expired.push(key.clone());
                continue;
            }
            match extend_if_grace_applies(&entry.warning, now, grace_seconds, false) {
                Some(kept) => visible.push(kept.into_owned()),
                None => expired.push(key.clone()),
            }
        }

        for key in &expired {
            tracing::debug!("Evicting warning {}", key);
            self.entries.shift_remove(key);
        }

        visible
    }
}
