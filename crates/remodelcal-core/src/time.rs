//! Time windows for sync passes and availability queries.
//!
//! [`TimeWindow`] is a half-open `[start, end)` interval in UTC. Sync passes
//! use it to bound the remote fetch, and the availability façade uses it for
//! hourly slots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// The bounds are reordered if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Creates a time window from a start time and duration.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// Creates a window reaching `behind` into the past and `ahead` into the
    /// future from `now`.
    pub fn around(now: DateTime<Utc>, behind: Duration, ahead: Duration) -> Self {
        Self::new(now - behind, now + ahead)
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }

    /// Checks if the interval `[start, end)` overlaps this window.
    ///
    /// Touching intervals (one ends exactly when the other starts) do not
    /// overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }

    /// Checks if another window overlaps this one.
    pub fn overlaps_window(&self, other: &TimeWindow) -> bool {
        self.overlaps(other.start, other.end)
    }
}
