//! Outlook (Microsoft Graph) calendar provider.

mod client;
mod config;
mod provider;
mod wire;

pub use client::GraphClient;
pub use config::OutlookConfig;
pub use provider::OutlookProvider;
pub use wire::{OutlookBody, OutlookDateTime, OutlookEvent};
