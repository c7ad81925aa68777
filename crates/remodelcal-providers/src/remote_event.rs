//! Canonical, provider-neutral form of a vendor event.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use remodelcal_core::{ConflictField, LocalEvent, ProviderKind, TimeWindow};

/// An event as seen on a provider, fetched per sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    /// The provider the event lives on.
    pub provider: ProviderKind,
    /// Vendor-assigned event id (the UID for CalDAV).
    pub id: String,
    /// Event title.
    pub title: String,
    /// Start time, truncated to whole seconds.
    pub start: DateTime<Utc>,
    /// End time, truncated to whole seconds.
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Last modification time reported by the vendor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Link to the event in the vendor's web UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl RemoteEvent {
    /// Creates a remote event with the required fields.
    pub fn new(
        provider: ProviderKind,
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            provider,
            id: id.into(),
            title: title.into(),
            start: start.trunc_subsecs(0),
            end: end.trunc_subsecs(0),
            notes: None,
            updated_at: None,
            etag: None,
            html_link: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_html_link(mut self, link: impl Into<String>) -> Self {
        self.html_link = Some(link.into());
        self
    }

    /// Returns the event's time span.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Returns the fields that differ from a linked local appointment.
    ///
    /// Timestamps compare at second precision.
    pub fn conflicting_fields(&self, local: &LocalEvent) -> Vec<ConflictField> {
        let mut fields = Vec::new();
        if self.title != local.title {
            fields.push(ConflictField::Title);
        }
        if self.start != local.start_time.trunc_subsecs(0) {
            fields.push(ConflictField::StartTime);
        }
        if self.end != local.end_time.trunc_subsecs(0) {
            fields.push(ConflictField::EndTime);
        }
        fields
    }

    /// Builds the local row inserted when this event is pulled.
    pub fn to_local(&self, user_id: &str) -> LocalEvent {
        let mut local = LocalEvent::new(user_id, &self.title, self.start, self.end)
            .with_remote_id(self.provider, &self.id);
        local.notes = self.notes.clone();
        local
    }
}
