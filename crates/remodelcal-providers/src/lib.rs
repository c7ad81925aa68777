//! CalendarProvider trait and implementations.
//!
//! This crate provides the abstraction layer for calendar vendors:
//!
//! - [`CalendarProvider`] - The trait every vendor adapter implements
//! - [`RemoteEvent`] - Canonical, provider-neutral event
//! - [`WireEvent`] - Tagged union of the vendor payload schemas
//! - [`TokenManager`] - Hands out valid access tokens, refreshing when needed
//! - [`FunctionsClient`] - Invokes the hosted OAuth functions
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  ┌───────────────┐  ┌───────────────┐
//! │  Calendar v3  │  │  Graph v1.0   │  │ iCloud CalDAV │
//! └───────┬───────┘  └───────┬───────┘  └───────┬───────┘
//!         ▼                  ▼                  ▼
//! ┌───────────────┐  ┌───────────────┐  ┌───────────────┐
//! │GoogleProvider │  │OutlookProvider│  │ AppleProvider │
//! └───────┬───────┘  └───────┬───────┘  └───────┬───────┘
//!         │ WireEvent::{Google, Outlook, Apple} │
//!         └──────────────────┼──────────────────┘
//!                            ▼
//!                     ┌─────────────┐
//!                     │ RemoteEvent │
//!                     └─────────────┘
//! ```

pub mod apple;
pub mod error;
pub mod functions;
pub mod google;
mod http;
pub mod outlook;
pub mod provider;
pub mod remote_event;
pub mod tokens;
pub mod wire;

// Re-export main types at crate root
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use functions::{FunctionTokenRefresher, FunctionsClient, FunctionsConfig, TokenGrant};
pub use provider::{BoxFuture, CalendarProvider, ErrorProvider, ProviderRegistry};
pub use remote_event::RemoteEvent;
pub use tokens::{CredentialStore, RefreshedToken, TokenManager, TokenRefresher};
pub use wire::WireEvent;
