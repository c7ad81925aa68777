//! Sync and availability configuration.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use remodelcal_core::{ConflictPolicy, TimeWindow};

use crate::lock::{DEFAULT_LOCK_TTL_SECS, default_holder};

/// Default days of history fetched per pass.
pub const DEFAULT_LOOKBEHIND_DAYS: i64 = 30;

/// Default days ahead fetched per pass.
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 90;

/// Longest lookbehind or lookahead accepted.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Longest lock lease accepted.
pub const MAX_LOCK_TTL_SECS: i64 = 86_400;

/// Settings for one [`SyncEngine`](crate::engine::SyncEngine).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How conflicting fields are resolved.
    pub policy: ConflictPolicy,
    pub lookbehind_days: i64,
    pub lookahead_days: i64,
    /// Lease lifetime of the per-user sync lock.
    pub lock_ttl: Duration,
    /// Process id written into lock leases.
    pub holder: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::default(),
            lookbehind_days: DEFAULT_LOOKBEHIND_DAYS,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            lock_ttl: Duration::seconds(DEFAULT_LOCK_TTL_SECS),
            holder: default_holder(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lookbehind_days(mut self, days: i64) -> Self {
        self.lookbehind_days = days;
        self
    }

    pub fn with_lookahead_days(mut self, days: i64) -> Self {
        self.lookahead_days = days;
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    /// Returns the window a pass fetches when run at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow::around(
            now,
            Duration::days(self.lookbehind_days),
            Duration::days(self.lookahead_days),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.lookbehind_days < 0 || self.lookahead_days < 0 {
            return Err("lookbehind_days and lookahead_days must not be negative".to_string());
        }
        if self.lookbehind_days > MAX_WINDOW_DAYS || self.lookahead_days > MAX_WINDOW_DAYS {
            return Err(format!(
                "lookbehind_days and lookahead_days must be at most {}",
                MAX_WINDOW_DAYS
            ));
        }
        if self.lookbehind_days + self.lookahead_days == 0 {
            return Err("sync window is empty".to_string());
        }
        if self.lock_ttl <= Duration::zero() {
            return Err("lock_ttl must be positive".to_string());
        }
        if self.lock_ttl > Duration::seconds(MAX_LOCK_TTL_SECS) {
            return Err(format!("lock_ttl must be at most {} seconds", MAX_LOCK_TTL_SECS));
        }
        if self.holder.trim().is_empty() {
            return Err("holder cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Business hours used to generate bookable slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityConfig {
    pub timezone: Tz,
    /// First slot starts at this local hour.
    pub start_hour: u32,
    /// Last slot ends at or before this local hour.
    pub end_hour: u32,
    pub slot_minutes: u32,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            start_hour: 9,
            end_hour: 17,
            slot_minutes: 60,
        }
    }
}

impl AvailabilityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_hours(mut self, start_hour: u32, end_hour: u32) -> Self {
        self.start_hour = start_hour;
        self.end_hour = end_hour;
        self
    }

    pub fn with_slot_minutes(mut self, minutes: u32) -> Self {
        self.slot_minutes = minutes;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(format!(
                "invalid business hours {}..{}",
                self.start_hour, self.end_hour
            ));
        }
        if self.slot_minutes == 0 {
            return Err("slot_minutes must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.policy, ConflictPolicy::RemoteWins);
        assert_eq!(config.lock_ttl, Duration::minutes(10));
        assert!(config.holder.contains(':'));
        assert!(config.validate().is_ok());

        let availability = AvailabilityConfig::default();
        assert_eq!((availability.start_hour, availability.end_hour), (9, 17));
        assert_eq!(availability.slot_minutes, 60);
        assert!(availability.validate().is_ok());
    }

    #[test]
    fn window_spans_lookbehind_and_lookahead() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let window = SyncConfig::new()
            .with_lookbehind_days(7)
            .with_lookahead_days(14)
            .window(now);
        assert_eq!(window.start, now - Duration::days(7));
        assert_eq!(window.end, now + Duration::days(14));
    }

    #[test]
    fn validation_errors() {
        assert!(SyncConfig::new().with_lookahead_days(-1).validate().is_err());
        assert!(SyncConfig::new().with_lock_ttl(Duration::zero()).validate().is_err());
        assert!(SyncConfig::new().with_lock_ttl(Duration::days(2)).validate().is_err());
        assert!(SyncConfig::new().with_lookahead_days(100_000_000).validate().is_err());
        assert!(SyncConfig::new().with_lookbehind_days(MAX_WINDOW_DAYS + 1).validate().is_err());
        assert!(
            SyncConfig::new()
                .with_lookbehind_days(MAX_WINDOW_DAYS)
                .with_lookahead_days(MAX_WINDOW_DAYS)
                .validate()
                .is_ok()
        );
        assert!(SyncConfig::new().with_holder(" ").validate().is_err());
        assert!(AvailabilityConfig::new().with_hours(17, 9).validate().is_err());
        assert!(AvailabilityConfig::new().with_hours(9, 25).validate().is_err());
        assert!(AvailabilityConfig::new().with_slot_minutes(0).validate().is_err());
    }
}
