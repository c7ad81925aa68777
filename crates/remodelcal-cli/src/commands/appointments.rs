//! Local appointment commands.

use chrono::{DateTime, Utc};
use tracing::info;

use remodelcal_core::LocalEvent;

use super::{Context, local_time, print_json};
use crate::error::{CliError, CliResult};

/// Validates and stores a new unlinked appointment. The next sync pass
/// pushes it to the primary calendar.
pub async fn create(
    context: &Context,
    user_id: &str,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    notes: Option<String>,
) -> CliResult<LocalEvent> {
    if title.trim().is_empty() {
        return Err(CliError::invalid("--title must not be empty"));
    }
    if end <= start {
        return Err(CliError::invalid("--end must be after --start"));
    }
    let mut event = LocalEvent::new(user_id, title.trim(), start, end);
    if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
        event = event.with_notes(notes);
    }
    context.store().insert_event(&event).await?;
    info!(user_id, event_id = %event.id, "appointment booked");
    Ok(event)
}

pub async fn book(
    context: &Context,
    user_id: &str,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    notes: Option<String>,
    json: bool,
) -> CliResult<()> {
    let event = create(context, user_id, title, start, end, notes).await?;
    if json {
        print_json(&event)
    } else {
        println!(
            "Booked {} at {} ({})",
            event.title,
            local_time(event.start_time, context.time_zone()),
            event.id
        );
        Ok(())
    }
}

/// Deletes a local appointment. Linked remote events are left in place.
pub async fn cancel(context: &Context, user_id: &str, event_id: &str, json: bool) -> CliResult<()> {
    let event = context.store().delete_event(user_id, event_id).await?;
    info!(user_id, event_id, "appointment cancelled");
    if json {
        print_json(&event)
    } else {
        println!("Cancelled {} ({})", event.title, event.id);
        if event.is_linked() {
            println!("Linked calendar events were not removed.");
        }
        Ok(())
    }
}
