//! Core types: accounts, local events, sync status, conflict policy, time windows

pub mod account;
pub mod conflict;
pub mod event;
pub mod provider;
pub mod status;
pub mod time;
pub mod tracing;

pub use account::{CalendarAccount, EXPIRY_SKEW_SECS};
pub use conflict::{
    ConflictField, ConflictPolicy, ConflictRecord, ConflictResolution, ParseConflictPolicyError,
};
pub use event::LocalEvent;
pub use provider::{ParseProviderKindError, ProviderKind};
pub use status::{ProviderFailure, SyncState, SyncStatus};
pub use time::TimeWindow;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, default_directive, init_tracing};
