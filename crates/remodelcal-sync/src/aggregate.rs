//! Read-only views across every connected calendar.
//!
//! Nothing here is cached; every call goes to the providers.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use remodelcal_core::{CalendarAccount, ProviderFailure, ProviderKind, TimeWindow};
use remodelcal_providers::{ProviderResult, ProviderRegistry, RemoteEvent};

use crate::config::AvailabilityConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::SyncStore;

/// A remote event tagged with the calendar it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    pub account_id: String,
    /// Display color of the source calendar.
    pub color: String,
    #[serde(flatten)]
    pub event: RemoteEvent,
}

impl CalendarEntry {
    pub fn provider(&self) -> ProviderKind {
        self.event.provider
    }
}

/// Events merged across accounts, plus the accounts that could not be read.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedEvents {
    pub events: Vec<CalendarEntry>,
    pub failures: Vec<ProviderFailure>,
}

/// A connected calendar as shown in the source picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSource {
    pub provider: ProviderKind,
    pub account_id: String,
    pub color: String,
    pub sync_enabled: bool,
    pub is_primary: bool,
    /// The token is valid or can be refreshed.
    pub connected: bool,
}

impl CalendarSource {
    fn from_account(account: &CalendarAccount, now: DateTime<Utc>) -> Self {
        Self {
            provider: account.provider,
            account_id: account.account_id.clone(),
            color: account.display_color().to_string(),
            sync_enabled: account.sync_enabled,
            is_primary: account.is_primary,
            connected: account.is_connected(now),
        }
    }
}

/// A bookable time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilitySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// False when the slot overlaps a calendar event or appointment.
    pub available: bool,
}

impl AvailabilitySlot {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

/// Merges events and availability across a user's calendars.
pub struct CalendarAggregator {
    store: Arc<dyn SyncStore>,
    providers: Arc<ProviderRegistry>,
    availability: AvailabilityConfig,
}

impl CalendarAggregator {
    pub fn new(
        store: Arc<dyn SyncStore>,
        providers: Arc<ProviderRegistry>,
        availability: AvailabilityConfig,
    ) -> Self {
        Self {
            store,
            providers,
            availability,
        }
    }

    /// Fetches every enabled account concurrently and returns the events
    /// sorted by start time.
    ///
    /// A failing account is reported in [`AggregatedEvents::failures`]; the
    /// other accounts' events are still returned.
    pub async fn get_all_events(
        &self,
        user_id: &str,
        window: TimeWindow,
    ) -> SyncResult<AggregatedEvents> {
        let accounts: Vec<CalendarAccount> = self
            .store
            .accounts(user_id)
            .await?
            .into_iter()
            .filter(|a| a.sync_enabled)
            .collect();

        let fetches = accounts
            .iter()
            .map(|account| self.fetch(user_id, account.provider, window));
        let results = join_all(fetches).await;

        let mut aggregated = AggregatedEvents::default();
        for (account, result) in accounts.iter().zip(results) {
            match result {
                Ok(events) => {
                    let color = account.display_color().to_string();
                    aggregated
                        .events
                        .extend(events.into_iter().map(|event| CalendarEntry {
                            account_id: account.account_id.clone(),
                            color: color.clone(),
                            event,
                        }));
                }
                Err(e) => {
                    warn!(user_id, provider = %account.provider, error = %e, "failed to fetch events");
                    aggregated.failures.push(ProviderFailure {
                        provider: account.provider,
                        code: e.code().as_str().to_string(),
                        message: e.message().to_string(),
                    });
                }
            }
        }

        aggregated
            .events
            .sort_by(|a, b| a.event.start.cmp(&b.event.start).then_with(|| a.event.end.cmp(&b.event.end)));
        debug!(
            user_id,
            count = aggregated.events.len(),
            failed = aggregated.failures.len(),
            "aggregated events"
        );
        Ok(aggregated)
    }

    async fn fetch(
        &self,
        user_id: &str,
        kind: ProviderKind,
        window: TimeWindow,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let provider = self.providers.get(kind)?;
        provider.list_events(user_id, window).await
    }

    /// Lists every connected account, enabled or not.
    pub async fn get_calendar_sources(&self, user_id: &str) -> SyncResult<Vec<CalendarSource>> {
        let now = Utc::now();
        Ok(self
            .store
            .accounts(user_id)
            .await?
            .iter()
            .map(|a| CalendarSource::from_account(a, now))
            .collect())
    }

    /// Returns the business-hours slots of `date` in the configured time
    /// zone, each marked unavailable when it overlaps a calendar event or a
    /// local appointment.
    pub async fn get_available_slots(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> SyncResult<Vec<AvailabilitySlot>> {
        self.availability.validate().map_err(SyncError::config)?;

        let slots = self.slot_windows(date);
        let Some(day) = slots
            .first()
            .zip(slots.last())
            .map(|(first, last)| TimeWindow::new(first.start, last.end))
        else {
            return Ok(Vec::new());
        };

        let mut busy: Vec<TimeWindow> = self
            .get_all_events(user_id, day)
            .await?
            .events
            .iter()
            .map(|e| e.event.window())
            .collect();
        busy.extend(
            self.store
                .events(user_id)
                .await?
                .iter()
                .map(|e| e.window())
                .filter(|w| w.overlaps_window(&day)),
        );

        Ok(slots
            .into_iter()
            .map(|slot| AvailabilitySlot {
                start: slot.start,
                end: slot.end,
                available: !busy.iter().any(|b| b.overlaps_window(&slot)),
            })
            .collect())
    }

    /// Splits the business hours of `date` into slots.
    ///
    /// Slots whose local start does not exist (a DST gap) are skipped.
    fn slot_windows(&self, date: NaiveDate) -> Vec<TimeWindow> {
        let config = &self.availability;
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        let open = midnight + Duration::hours(i64::from(config.start_hour));
        let close = midnight + Duration::hours(i64::from(config.end_hour));
        let step = Duration::minutes(i64::from(config.slot_minutes));

        let mut slots = Vec::new();
        let mut start = open;
        while start + step <= close {
            let end = start + step;
            if let (Some(s), Some(e)) = (self.to_utc(start), self.to_utc(end)) {
                slots.push(TimeWindow::new(s, e));
            }
            start = end;
        }
        slots
    }

    fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.availability
            .timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl std::fmt::Debug for CalendarAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarAggregator")
            .field("providers", &self.providers)
            .field("availability", &self.availability)
            .finish_non_exhaustive()
    }
}
