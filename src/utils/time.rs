//! Wall-clock helpers for token validity windows and cache expiry.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in whole seconds. A clock set before 1970 reads as 0.
pub fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
