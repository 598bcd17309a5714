use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// The instant `age` before now, saturating at the earliest representable time.
pub fn cutoff_before_now(age: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    TimeDelta::from_std(age)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert whole hours into a `Duration`.
pub fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(3600))
}
