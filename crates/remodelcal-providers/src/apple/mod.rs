//! Apple calendar provider (iCloud CalDAV).
//!
//! Events are fetched with a calendar-query REPORT and written with PUT.
//! Authentication is HTTP Basic with the Apple ID and an app-specific
//! password, stored as the account's access token.

mod client;
mod config;
mod ics;
mod provider;
mod xml;

pub use client::CalDavClient;
pub use config::AppleConfig;
pub use ics::AppleEvent;
pub use provider::AppleProvider;
