//! Grace period handling for warnings past their nominal end.

use std::borrow::Cow;

use crate::types::Warning;

/// Decide what a consumer should see of `warning` at `now`.
///
/// - no valid end: unchanged if `allow_invalid_end`, otherwise dropped
/// - `now <= end`: unchanged
/// - `end < now <= end + grace`: a copy with `end` moved to `end + grace`
/// - later: dropped
///
/// The input is never modified, so callers holding the upstream original can
/// re-evaluate it on every cycle against the true end.
pub fn extend_if_grace_applies(
    warning: &Warning,
    now: i64,
    grace_seconds: i64,
    allow_invalid_end: bool,
) -> Option<Cow<'_, Warning>> {
    let end = warning.end_ts();
    if end <= 0 {
        return allow_invalid_end.then_some(Cow::Borrowed(warning));
    }
    if now <= end {
        return Some(Cow::Borrowed(warning));
    }

    let extended_end = end.saturating_add(grace_seconds);
    if now <= extended_end {
        return Some(Cow::Owned(warning.with_end(extended_end)));
    }
    None
}
