//! Appointment records owned by this application.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::ProviderKind;
use crate::time::TimeWindow;

/// A local appointment (the `appointments` table).
///
/// Created by booking actions or by a sync pass pulling a remote event.
/// `remote_ids` links the row to at most one remote event per provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEvent {
    /// Row identifier.
    pub id: String,
    /// Owner of the appointment.
    pub user_id: String,
    /// Appointment title.
    pub title: String,
    /// Start time (UTC).
    pub start_time: DateTime<Utc>,
    /// End time (UTC).
    pub end_time: DateTime<Utc>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Remote event id per provider.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remote_ids: BTreeMap<ProviderKind, String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl LocalEvent {
    /// Creates an unlinked appointment with a fresh id.
    ///
    /// Times are truncated to whole seconds, the precision every provider
    /// round-trips.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            start_time: start_time.trunc_subsecs(0),
            end_time: end_time.trunc_subsecs(0),
            notes: None,
            remote_ids: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method to set notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Builder method to link a remote event.
    pub fn with_remote_id(mut self, provider: ProviderKind, remote_id: impl Into<String>) -> Self {
        self.remote_ids.insert(provider, remote_id.into());
        self
    }

    /// Builder method to set the modification time.
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Returns the linked remote event id for a provider.
    pub fn remote_event_id(&self, provider: ProviderKind) -> Option<&str> {
        self.remote_ids.get(&provider).map(String::as_str)
    }

    /// Links this appointment to a remote event.
    pub fn link_remote(&mut self, provider: ProviderKind, remote_id: impl Into<String>) {
        self.remote_ids.insert(provider, remote_id.into());
    }

    /// Returns true if the appointment is linked to any provider.
    pub fn is_linked(&self) -> bool {
        !self.remote_ids.is_empty()
    }

    /// Returns the appointment's time span.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    /// Marks the row as modified at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap()
    }

    #[test]
    fn new_event_is_unlinked() {
        let event = LocalEvent::new("user-1", "Consult", start(), start() + Duration::hours(1));
        assert!(!event.id.is_empty());
        assert!(!event.is_linked());
        assert_eq!(event.remote_event_id(ProviderKind::Google), None);
        assert_eq!(event.window().duration(), Duration::hours(1));
    }

    #[test]
    fn ids_are_unique() {
        let a = LocalEvent::new("user-1", "A", start(), start());
        let b = LocalEvent::new("user-1", "B", start(), start());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn subseconds_are_dropped() {
        let precise = start() + Duration::milliseconds(750);
        let event = LocalEvent::new("user-1", "Consult", precise, precise);
        assert_eq!(event.start_time, start());
    }

    #[test]
    fn remote_links_are_per_provider() {
        let mut event = LocalEvent::new("user-1", "Site Visit", start(), start())
            .with_remote_id(ProviderKind::Google, "g123");
        event.link_remote(ProviderKind::Outlook, "AAMkAG");

        assert!(event.is_linked());
        assert_eq!(event.remote_event_id(ProviderKind::Google), Some("g123"));
        assert_eq!(event.remote_event_id(ProviderKind::Outlook), Some("AAMkAG"));
        assert_eq!(event.remote_event_id(ProviderKind::Apple), None);
    }

    #[test]
    fn remote_ids_serialize_as_provider_map() {
        let event = LocalEvent::new("user-1", "Site Visit", start(), start())
            .with_remote_id(ProviderKind::Google, "g123");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["remote_ids"]["google"], "g123");

        let parsed: LocalEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
