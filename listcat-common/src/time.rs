//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Age of `timestamp` relative to now, or `None` if it lies in the future
pub fn age_of(timestamp: DateTime<Utc>) -> Option<std::time::Duration> {
    (Utc::now() - timestamp).to_std().ok()
}

/// True when `last` is absent or older than `max_age`
pub fn is_stale(last: Option<DateTime<Utc>>, max_age: std::time::Duration) -> bool {
    match last {
        None => true,
        Some(ts) => age_of(ts).map(|age| age >= max_age).unwrap_or(false),
    }
}
