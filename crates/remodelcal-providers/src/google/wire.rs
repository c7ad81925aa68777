//! Google Calendar v3 event schema.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use remodelcal_core::{LocalEvent, ProviderKind};

use crate::remote_event::RemoteEvent;

/// An event resource from the Google Calendar API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub start: GoogleEventTime,
    #[serde(default)]
    pub end: GoogleEventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Event time; `date` is set for all-day events, `dateTime` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl GoogleEventTime {
    fn utc(dt: DateTime<Utc>) -> Self {
        Self {
            date: None,
            date_time: Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            time_zone: Some("UTC".to_string()),
        }
    }

    fn parse(&self) -> Option<DateTime<Utc>> {
        if let Some(dt) = &self.date_time {
            return DateTime::parse_from_rfc3339(dt)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| warn!("failed to parse dateTime {}: {}", dt, e))
                .ok();
        }
        let date = self.date.as_ref()?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| warn!("failed to parse date {}: {}", date, e))
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventListResponse {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

impl GoogleEvent {
    /// Builds the request body for an insert or update.
    pub fn from_local(event: &LocalEvent) -> Self {
        Self {
            summary: Some(event.title.clone()),
            description: event.notes.clone(),
            start: GoogleEventTime::utc(event.start_time),
            end: GoogleEventTime::utc(event.end_time),
            ..Self::default()
        }
    }

    /// Returns true for events Google reports as cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Converts to the canonical form; `None` for cancelled or unusable events.
    pub fn into_remote(self) -> Option<RemoteEvent> {
        if self.is_cancelled() {
            return None;
        }
        let id = self.id?;
        let Some(start) = self.start.parse() else {
            warn!("event {} has no usable start time", id);
            return None;
        };
        let end = self.end.parse().unwrap_or(start);
        let mut remote = RemoteEvent::new(
            ProviderKind::Google,
            id,
            self.summary.unwrap_or_default(),
            start,
            end,
        );
        remote.notes = self.description;
        remote.updated_at = self
            .updated
            .as_deref()
            .and_then(|u| DateTime::parse_from_rfc3339(u).ok())
            .map(|d| d.with_timezone(&Utc));
        remote.etag = self.etag;
        remote.html_link = self.html_link;
        Some(remote)
    }
}
