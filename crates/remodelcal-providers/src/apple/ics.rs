//! iCalendar (RFC 5545) conversion for CalDAV events.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event, EventLike,
    EventStatus,
};
use tracing::{debug, warn};

use remodelcal_core::{LocalEvent, ProviderKind};

use crate::remote_event::RemoteEvent;

/// A VEVENT stored in an iCloud calendar collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleEvent {
    /// The event UID; events created here are stored at `{uid}.ics`.
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub cancelled: bool,
    /// Resource path on the server.
    pub href: Option<String>,
    pub etag: Option<String>,
}

impl AppleEvent {
    /// Parses every VEVENT in a calendar object resource.
    ///
    /// Unparseable content yields no events.
    pub fn parse_calendar(ics: &str) -> Vec<AppleEvent> {
        let calendar = match ics.parse::<Calendar>() {
            Ok(cal) => cal,
            Err(e) => {
                warn!(error = %e, "failed to parse ICS content");
                return Vec::new();
            }
        };

        calendar
            .iter()
            .filter_map(|component| match component {
                CalendarComponent::Event(event) => parse_event(event),
                _ => None,
            })
            .collect()
    }

    /// Builds the VEVENT written for a local appointment.
    pub fn from_local(uid: impl Into<String>, event: &LocalEvent) -> Self {
        Self {
            uid: uid.into(),
            summary: Some(event.title.clone()),
            description: event.notes.clone(),
            start: event.start_time,
            end: event.end_time,
            last_modified: None,
            cancelled: false,
            href: None,
            etag: None,
        }
    }

    /// Sets the resource location reported by the server.
    pub fn with_resource(mut self, href: Option<String>, etag: Option<String>) -> Self {
        self.href = href;
        self.etag = etag;
        self
    }

    /// Serializes the event as a complete VCALENDAR.
    pub fn to_ics(&self) -> String {
        let mut event = Event::new();
        event
            .uid(&self.uid)
            .starts(self.start)
            .ends(self.end)
            .timestamp(Utc::now());
        if let Some(summary) = &self.summary {
            event.summary(summary);
        }
        if let Some(description) = &self.description {
            event.description(description);
        }

        let mut calendar = Calendar::new();
        calendar.push(event.done());
        calendar.done().to_string()
    }

    /// Converts to the canonical form; `None` for cancelled events.
    pub fn into_remote(self) -> Option<RemoteEvent> {
        if self.cancelled {
            return None;
        }
        let mut remote = RemoteEvent::new(
            ProviderKind::Apple,
            self.uid,
            self.summary.unwrap_or_default(),
            self.start,
            self.end,
        );
        remote.notes = self.description;
        remote.updated_at = self.last_modified;
        remote.etag = self.etag;
        Some(remote)
    }
}

fn parse_event(event: &Event) -> Option<AppleEvent> {
    let uid = event.get_uid()?.to_string();
    let start = event.get_start().and_then(to_utc)?;
    let end = event.get_end().and_then(to_utc).unwrap_or(start);

    let parsed = AppleEvent {
        summary: event.get_summary().map(str::to_string),
        description: event.get_description().map(str::to_string),
        start,
        end,
        last_modified: event.get_last_modified(),
        cancelled: matches!(event.get_status(), Some(EventStatus::Cancelled)),
        href: None,
        etag: None,
        uid,
    };

    debug!(uid = %parsed.uid, start = %parsed.start, "parsed event from ICS");
    Some(parsed)
}

/// Converts an iCalendar date or date-time to UTC.
///
/// All-day dates map to midnight UTC. Unknown TZIDs are read as UTC.
fn to_utc(value: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match value {
        DatePerhapsTime::Date(date) => midnight_utc(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            Some(Utc.from_utc_datetime(&naive))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            Some(resolve_tzid(&date_time, &tzid))
        }
    }
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

fn resolve_tzid(naive: &NaiveDateTime, tzid: &str) -> DateTime<Utc> {
    match tzid.parse::<Tz>() {
        Ok(tz) => tz
            .from_local_datetime(naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(naive)),
        Err(_) => {
            warn!(tzid, "unknown TZID, assuming UTC");
            Utc.from_utc_datetime(naive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_ics() -> &'static str {
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Apple Inc.//iCloud//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:7F3C-1111\r\n\
         DTSTART:20250605T140000Z\r\n\
         DTEND:20250605T150000Z\r\n\
         SUMMARY:Deck inspection\r\n\
         DESCRIPTION:Bring the moisture meter\r\n\
         LAST-MODIFIED:20250601T120000Z\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR"
    }

    #[test]
    fn parse_basic_event() {
        let events = AppleEvent::parse_calendar(sample_ics());
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.uid, "7F3C-1111");
        assert_eq!(event.summary.as_deref(), Some("Deck inspection"));
        assert_eq!(event.description.as_deref(), Some("Bring the moisture meter"));
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 6, 5, 14, 0, 0).unwrap());
        assert_eq!(event.end - event.start, Duration::hours(1));
        assert_eq!(
            event.last_modified,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
        );
        assert!(!event.cancelled);
    }

    #[test]
    fn parse_all_day_event() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:allday-1\r\n\
                   DTSTART;VALUE=DATE:20250610\r\n\
                   DTEND;VALUE=DATE:20250611\r\n\
                   SUMMARY:Dumpster delivery\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let events = AppleEvent::parse_calendar(ics);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap());
        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_event_with_tzid() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:tz-1\r\n\
                   DTSTART;TZID=America/New_York:20250605T090000\r\n\
                   DTEND;TZID=America/New_York:20250605T100000\r\n\
                   SUMMARY:Cabinet install\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let events = AppleEvent::parse_calendar(ics);
        assert_eq!(events.len(), 1);
        // EDT is UTC-4
        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 6, 5, 13, 0, 0).unwrap());
    }

    #[test]
    fn cancelled_event_is_dropped() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:cancelled-1\r\n\
                   DTSTART:20250605T140000Z\r\n\
                   DTEND:20250605T150000Z\r\n\
                   STATUS:CANCELLED\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let events = AppleEvent::parse_calendar(ics);
        assert_eq!(events.len(), 1);
        assert!(events[0].cancelled);
        assert!(events[0].clone().into_remote().is_none());
    }

    #[test]
    fn invalid_content_yields_nothing() {
        assert!(AppleEvent::parse_calendar("not an ics file").is_empty());
    }

    #[test]
    fn to_ics_parses_back() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap();
        let local = LocalEvent::new("user-1", "Consult", start, start + Duration::hours(1))
            .with_notes("Side door");

        let ics = AppleEvent::from_local("uid-42", &local).to_ics();
        assert!(ics.contains("UID:uid-42"));
        assert!(ics.contains("SUMMARY:Consult"));

        let parsed = AppleEvent::parse_calendar(&ics);
        assert_eq!(parsed.len(), 1);
        let remote = parsed[0].clone().into_remote().unwrap();
        assert_eq!(remote.id, "uid-42");
        assert_eq!(remote.title, "Consult");
        assert_eq!(remote.start, start);
        assert_eq!(remote.notes.as_deref(), Some("Side door"));
    }
}
