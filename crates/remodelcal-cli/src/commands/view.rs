//! Read-only views: events, slots, sources, status and conflicts.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use remodelcal_core::{ConflictField, ConflictRecord, ConflictResolution, TimeWindow};
use remodelcal_sync::{AggregatedEvents, AvailabilitySlot, CalendarSource};

use super::sync::render_status;
use super::{Context, local_time, print_json};
use crate::error::{CliError, CliResult};

/// Shows `days` days of events starting at `from` (today by default).
pub async fn events(
    context: &Context,
    user_id: &str,
    from: Option<NaiveDate>,
    days: i64,
    json: bool,
) -> CliResult<()> {
    let tz = context.time_zone();
    let window = day_window(tz, from.unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive()), days)?;
    let aggregated = context.aggregator().get_all_events(user_id, window).await?;
    if json {
        print_json(&aggregated)
    } else {
        print!("{}", render_events(&aggregated, tz));
        Ok(())
    }
}

/// Returns the UTC window covering `days` local days from `first`.
fn day_window(tz: Tz, first: NaiveDate, days: i64) -> CliResult<TimeWindow> {
    if days < 1 {
        return Err(CliError::invalid("--days must be at least 1"));
    }
    let last = first
        .checked_add_signed(Duration::days(days))
        .ok_or_else(|| CliError::invalid("--days is out of range"))?;
    Ok(TimeWindow::new(local_midnight(tz, first)?, local_midnight(tz, last)?))
}

fn local_midnight(tz: Tz, date: NaiveDate) -> CliResult<chrono::DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::invalid(format!("invalid date {}", date)))?;
    // Zones that skip midnight start the day at the first valid instant.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CliError::invalid(format!("{} has no midnight in {}", date, tz)))
}

fn render_events(aggregated: &AggregatedEvents, tz: Tz) -> String {
    let mut out = String::new();
    if aggregated.events.is_empty() {
        out.push_str("No events.\n");
    }
    for entry in &aggregated.events {
        out.push_str(&format!(
            "{}  {:<8} {}\n",
            local_time(entry.event.start, tz),
            entry.provider().as_str(),
            entry.event.title
        ));
    }
    for failure in &aggregated.failures {
        out.push_str(&format!(
            "warning: {} unavailable [{}] {}\n",
            failure.provider, failure.code, failure.message
        ));
    }
    out
}

/// Shows the bookable slots for one day.
pub async fn slots(context: &Context, user_id: &str, date: NaiveDate, json: bool) -> CliResult<()> {
    let slots = context.aggregator().get_available_slots(user_id, date).await?;
    if json {
        print_json(&slots)
    } else {
        print!("{}", render_slots(&slots, context.time_zone()));
        Ok(())
    }
}

fn render_slots(slots: &[AvailabilitySlot], tz: Tz) -> String {
    slots
        .iter()
        .map(|slot| {
            format!(
                "{} - {}  {}\n",
                slot.start.with_timezone(&tz).format("%H:%M"),
                slot.end.with_timezone(&tz).format("%H:%M %Z"),
                if slot.available { "available" } else { "busy" }
            )
        })
        .collect()
}

pub async fn sources(context: &Context, user_id: &str, json: bool) -> CliResult<()> {
    let sources = context.aggregator().get_calendar_sources(user_id).await?;
    if json {
        print_json(&sources)
    } else {
        print!("{}", render_sources(&sources));
        Ok(())
    }
}

fn render_sources(sources: &[CalendarSource]) -> String {
    if sources.is_empty() {
        return "No calendars connected.\n".to_string();
    }
    sources
        .iter()
        .map(|s| {
            let mut flags = Vec::new();
            if s.is_primary {
                flags.push("primary");
            }
            if !s.sync_enabled {
                flags.push("sync off");
            }
            if !s.connected {
                flags.push("reconnect needed");
            }
            format!(
                "{:<8} {} {}{}\n",
                s.provider.as_str(),
                s.color,
                s.account_id,
                if flags.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", flags.join(", "))
                }
            )
        })
        .collect()
}

/// Shows the last recorded pass.
pub async fn status(context: &Context, user_id: &str, json: bool) -> CliResult<()> {
    let status = context.store().status(user_id).await?;
    match (status, json) {
        (Some(status), true) => print_json(&status),
        (None, true) => print_json(&serde_json::Value::Null),
        (Some(status), false) => {
            print!("{}", render_status(&status, context));
            Ok(())
        }
        (None, false) => {
            println!("No sync has run for {}.", user_id);
            Ok(())
        }
    }
}

pub async fn conflicts(context: &Context, user_id: &str, json: bool) -> CliResult<()> {
    let conflicts = context.store().conflicts(user_id).await?;
    if json {
        print_json(&conflicts)
    } else {
        print!("{}", render_conflicts(&conflicts, context.time_zone()));
        Ok(())
    }
}

fn render_conflicts(conflicts: &[ConflictRecord], tz: Tz) -> String {
    if conflicts.is_empty() {
        return "No conflicts.\n".to_string();
    }
    conflicts
        .iter()
        .map(|c| {
            let fields: Vec<&str> = c.fields.iter().map(field_name).collect();
            format!(
                "{}  {:<8} {} <-> {}  [{}] {} ({})\n",
                local_time(c.detected_at, tz),
                c.provider.as_str(),
                c.local_event_id,
                c.remote_event_id,
                fields.join(","),
                resolution_name(c.resolution),
                c.policy
            )
        })
        .collect()
}

fn field_name(field: &ConflictField) -> &'static str {
    match field {
        ConflictField::Title => "title",
        ConflictField::StartTime => "start_time",
        ConflictField::EndTime => "end_time",
    }
}

fn resolution_name(resolution: ConflictResolution) -> &'static str {
    match resolution {
        ConflictResolution::LocalUpdated => "local updated",
        ConflictResolution::RemoteUpdated => "remote updated",
        ConflictResolution::Merged => "merged",
        ConflictResolution::PendingReview => "pending review",
    }
}
