//! Replay-window timestamp checks.

use chrono::Utc;

/// Default replay window in seconds (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Checks that a Unix-seconds timestamp lies within `tolerance_secs` of now.
///
/// Both directions are checked, so pre-dated timestamps are rejected as well
/// as stale ones. Non-numeric input is never fresh.
pub fn is_timestamp_fresh(timestamp: &str, tolerance_secs: u64) -> bool {
    is_timestamp_fresh_at(timestamp, tolerance_secs, Utc::now().timestamp())
}

/// Same as [`is_timestamp_fresh`] with an explicit current time.
pub fn is_timestamp_fresh_at(timestamp: &str, tolerance_secs: u64, now: i64) -> bool {
    match timestamp.parse::<i64>() {
        Ok(ts) => now.abs_diff(ts) <= tolerance_secs,
        Err(e) => {
            tracing::debug!("Invalid webhook timestamp {:?}: {}", timestamp, e);
            false
        }
    }
}
