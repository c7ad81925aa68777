//! Google Calendar provider.
//!
//! Talks to Calendar API v3 with OAuth bearer tokens obtained from the
//! [`TokenManager`](crate::tokens::TokenManager):
//!
//! - list: `GET /calendars/{id}/events` with `singleEvents=true`, paged
//! - create: `POST /calendars/{id}/events`
//! - update: `PUT /calendars/{id}/events/{eventId}`

mod client;
mod config;
mod provider;
mod wire;

pub use client::GoogleCalendarClient;
pub use config::GoogleConfig;
pub use provider::GoogleProvider;
pub use wire::{GoogleEvent, GoogleEventTime};
