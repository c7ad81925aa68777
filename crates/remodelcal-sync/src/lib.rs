//! Calendar sync for remodelcal.
//!
//! This crate ties the provider adapters to the local appointment store:
//!
//! - [`SyncEngine`] - Runs full sync passes with conflict resolution
//! - [`SyncStore`] - The tables a pass reads and writes, with [`LocalStore`]
//! - [`SyncLock`] - Durable per-user lease so passes never overlap
//! - [`CalendarAggregator`] - Merged events, sources and free slots
//! - [`AccountService`] - Connect, configure and disconnect accounts

pub mod accounts;
pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod store;

pub use accounts::AccountService;
pub use aggregate::{AggregatedEvents, AvailabilitySlot, CalendarAggregator, CalendarEntry, CalendarSource};
pub use config::{AvailabilityConfig, SyncConfig};
pub use engine::SyncEngine;
pub use error::{StoreError, StoreResult, SyncError, SyncResult};
pub use lock::{LockGuard, LockLease, LockOutcome, SyncLock, default_holder};
pub use store::{LocalStore, StoreCredentials, SyncStore};
