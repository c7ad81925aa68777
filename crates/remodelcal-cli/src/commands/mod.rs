//! Command implementations.

pub mod accounts;
pub mod appointments;
pub mod config;
pub mod context;
pub mod sync;
pub mod view;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

pub use context::Context;

use crate::error::CliResult;

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Formats a UTC instant in the business time zone.
pub(crate) fn local_time(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%a %Y-%m-%d %H:%M %Z").to_string()
}
