//! Time and timestamp helpers.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for event times, provenance and scheduled fire times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Wall-clock time at which something scheduled `delay` from `start` is due.
///
/// Saturates at `start` when the delay does not fit a [`TimeDelta`].
#[must_use]
pub fn due_after(start: Timestamp, delay: Duration) -> Timestamp {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(start)
}
