//! Microsoft Graph event schema.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use remodelcal_core::{LocalEvent, ProviderKind};

use crate::remote_event::RemoteEvent;

/// Graph's wire format for naive timestamps.
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// An event resource from Microsoft Graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<OutlookBody>,
    #[serde(default, skip_serializing)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub start: OutlookDateTime,
    #[serde(default)]
    pub end: OutlookDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(default, skip_serializing)]
    pub is_cancelled: Option<bool>,
    #[serde(default, skip_serializing)]
    pub last_modified_date_time: Option<String>,
    #[serde(default, skip_serializing)]
    pub web_link: Option<String>,
    #[serde(default, rename = "@odata.etag", skip_serializing)]
    pub etag: Option<String>,
}

/// Item body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookBody {
    /// `text` or `html`.
    pub content_type: String,
    pub content: String,
}

/// A `dateTimeTimeZone` value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookDateTime {
    pub date_time: String,
    pub time_zone: String,
}

impl OutlookDateTime {
    fn utc(dt: DateTime<Utc>) -> Self {
        Self {
            date_time: dt.format(GRAPH_DATETIME_FORMAT).to_string(),
            time_zone: "UTC".to_string(),
        }
    }

    /// Parses the value. Requests ask for UTC, so naive values are UTC.
    fn parse(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_time.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        // Graph emits seven fractional digits, e.g. 2025-06-01T15:00:00.0000000
        let without_fraction = raw.split('.').next().unwrap_or(raw);
        NaiveDateTime::parse_from_str(without_fraction, GRAPH_DATETIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| warn!("failed to parse Graph dateTime {}: {}", raw, e))
            .ok()
    }
}

/// A page of `calendarView` results.
#[derive(Debug, Deserialize)]
pub(crate) struct CalendarViewResponse {
    #[serde(default)]
    pub value: Vec<OutlookEvent>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl OutlookEvent {
    /// Builds the request body for a create or patch.
    pub fn from_local(event: &LocalEvent) -> Self {
        Self {
            subject: Some(event.title.clone()),
            body: event.notes.as_ref().map(|notes| OutlookBody {
                content_type: "text".to_string(),
                content: notes.clone(),
            }),
            start: OutlookDateTime::utc(event.start_time),
            end: OutlookDateTime::utc(event.end_time),
            ..Self::default()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.unwrap_or(false)
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

        let notes = match self.body {
            Some(body) if body.content_type.eq_ignore_ascii_case("text") => Some(body.content),
            _ => self.body_preview,
        }
        .filter(|n| !n.trim().is_empty());

        let mut remote = RemoteEvent::new(
            ProviderKind::Outlook,
            id,
            self.subject.unwrap_or_default(),
            start,
            end,
        );
        remote.notes = notes;
        remote.updated_at = self
            .last_modified_date_time
            .as_deref()
            .and_then(|u| DateTime::parse_from_rfc3339(u).ok())
            .map(|d| d.with_timezone(&Utc));
        remote.etag = self.etag;
        remote.html_link = self.web_link;
        Some(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn parse_calendar_view_page() {
        let json = r#"{
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users('me')/calendarView",
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/calendarView?$skip=10",
            "value": [
                {
                    "@odata.etag": "W/\"DwAAABYAAAA\"",
                    "id": "AAMkAGI2",
                    "subject": "Bathroom estimate",
                    "bodyPreview": "Second floor bath",
                    "body": {"contentType": "html", "content": "<html>Second floor bath</html>"},
                    "start": {"dateTime": "2025-06-03T13:00:00.0000000", "timeZone": "UTC"},
                    "end": {"dateTime": "2025-06-03T14:30:00.0000000", "timeZone": "UTC"},
                    "isCancelled": false,
                    "lastModifiedDateTime": "2025-05-28T17:00:00Z",
                    "webLink": "https://outlook.office365.com/owa/?itemid=AAMkAGI2"
                },
                {
                    "id": "AAMkAGI3",
                    "subject": "Cancelled walkthrough",
                    "start": {"dateTime": "2025-06-04T13:00:00.0000000", "timeZone": "UTC"},
                    "end": {"dateTime": "2025-06-04T14:00:00.0000000", "timeZone": "UTC"},
                    "isCancelled": true
                }
            ]
        }"#;

        let page: CalendarViewResponse = serde_json::from_str(json).unwrap();
        assert!(page.next_link.is_some());
        assert_eq!(page.value.len(), 2);

        let mut items = page.value.into_iter();
        let remote = items.next().unwrap().into_remote().unwrap();
        assert_eq!(remote.provider, ProviderKind::Outlook);
        assert_eq!(remote.title, "Bathroom estimate");
        assert_eq!(remote.start, Utc.with_ymd_and_hms(2025, 6, 3, 13, 0, 0).unwrap());
        assert_eq!(remote.end - remote.start, Duration::minutes(90));
        assert_eq!(remote.notes.as_deref(), Some("Second floor bath"));
        assert_eq!(remote.etag.as_deref(), Some("W/\"DwAAABYAAAA\""));

        assert!(items.next().unwrap().into_remote().is_none());
    }

    #[test]
    fn from_local_sends_utc_times() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap();
        let local = LocalEvent::new("user-1", "Consult", start, start + Duration::hours(1))
            .with_notes("Gate code 1234");

        let value = serde_json::to_value(OutlookEvent::from_local(&local)).unwrap();
        assert_eq!(value["subject"], "Consult");
        assert_eq!(value["start"]["dateTime"], "2025-06-01T15:00:00");
        assert_eq!(value["start"]["timeZone"], "UTC");
        assert_eq!(value["body"]["contentType"], "text");
        assert_eq!(value["body"]["content"], "Gate code 1234");
        assert!(value.get("isCancelled").is_none());
        assert!(value.get("id").is_none());
    }
}
