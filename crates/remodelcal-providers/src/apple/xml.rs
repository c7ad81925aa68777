//! WebDAV XML for CalDAV REPORT requests.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::{ProviderError, ProviderResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

/// One `<response>` of a calendar-query multistatus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub href: String,
    pub etag: Option<String>,
    pub calendar_data: String,
}

/// Generates a calendar-query REPORT body with a VEVENT time-range filter.
pub fn calendar_query_body(start: DateTime<Utc>, end: DateTime<Utc>) -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut query = BytesStart::new("c:calendar-query");
    query.push_attribute(("xmlns:d", DAV_NS));
    query.push_attribute(("xmlns:c", CALDAV_NS));
    writer.write_event(Event::Start(query)).map_err(xml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("d:prop")))
        .map_err(xml_error)?;
    write_empty_element(&mut writer, "d:getetag")?;
    write_empty_element(&mut writer, "c:calendar-data")?;
    writer
        .write_event(Event::End(BytesEnd::new("d:prop")))
        .map_err(xml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("c:filter")))
        .map_err(xml_error)?;

    let mut vcal_filter = BytesStart::new("c:comp-filter");
    vcal_filter.push_attribute(("name", "VCALENDAR"));
    writer.write_event(Event::Start(vcal_filter)).map_err(xml_error)?;

    let mut vevent_filter = BytesStart::new("c:comp-filter");
    vevent_filter.push_attribute(("name", "VEVENT"));
    writer.write_event(Event::Start(vevent_filter)).map_err(xml_error)?;

    let mut time_range = BytesStart::new("c:time-range");
    time_range.push_attribute(("start", format_icalendar_datetime(start).as_str()));
    time_range.push_attribute(("end", format_icalendar_datetime(end).as_str()));
    writer.write_event(Event::Empty(time_range)).map_err(xml_error)?;

    for name in ["c:comp-filter", "c:comp-filter", "c:filter", "c:calendar-query"] {
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)?;
    }

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(xml_error)
}

/// Parses a multistatus REPORT response.
///
/// Responses without calendar data (e.g. a 404 propstat) are skipped.
pub fn parse_report_response(xml: &str) -> ProviderResult<Vec<ReportEntry>> {
    let mut results = Vec::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current_href: Option<String> = None;
    let mut current_etag: Option<String> = None;
    let mut current_data: Option<String> = None;
    let mut in_response = false;
    let mut current_element: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        in_response = true;
                        current_href = None;
                        current_etag = None;
                        current_data = None;
                    }
                    local @ ("href" | "getetag" | "calendar-data") => {
                        current_element = Some(local.to_string());
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if local_name(&name) == "response" && in_response {
                    if let (Some(href), Some(calendar_data)) =
                        (current_href.take(), current_data.take())
                    {
                        results.push(ReportEntry {
                            href,
                            etag: current_etag.take(),
                            calendar_data,
                        });
                    }
                    in_response = false;
                }
                current_element = None;
            }
            Ok(Event::Text(e)) => {
                if let Some(elem) = current_element.as_deref() {
                    let text = e.unescape().map_err(xml_error)?.to_string();
                    assign(elem, text, &mut current_href, &mut current_etag, &mut current_data);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(elem) = current_element.as_deref() {
                    let text = String::from_utf8_lossy(&e).to_string();
                    assign(elem, text, &mut current_href, &mut current_etag, &mut current_data);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProviderError::invalid_response(format!(
                    "malformed multistatus response: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(results)
}

fn assign(
    elem: &str,
    text: String,
    href: &mut Option<String>,
    etag: &mut Option<String>,
    data: &mut Option<String>,
) {
    match elem {
        "href" => *href = Some(text),
        "getetag" => *etag = Some(text.trim_matches('"').to_string()),
        "calendar-data" => *data = Some(text),
        _ => {}
    }
}

fn write_empty_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str) -> ProviderResult<()> {
    writer
        .write_event(Event::Empty(BytesStart::new(name)))
        .map_err(xml_error)
}

fn xml_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::internal(format!("failed to build XML: {}", e))
}

/// Extracts the local name from a potentially namespaced element name.
fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Formats a datetime for iCalendar time-range filters (UTC format).
fn format_icalendar_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
