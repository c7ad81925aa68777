//! Store and sync error types.

use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

use remodelcal_providers::ProviderError;

use crate::lock::LockLease;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by a [`SyncStore`](crate::store::SyncStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while reading or writing the store file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The store file could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The row does not exist.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The row, or a unique key it carries, already exists.
    #[error("{what} already exists: {id}")]
    Duplicate { what: &'static str, id: String },
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { what, id: id.into() }
    }

    /// Creates a duplicate error.
    pub fn duplicate(what: &'static str, id: impl Into<String>) -> Self {
        Self::Duplicate { what, id: id.into() }
    }

    /// Returns true for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors that can occur during a sync pass or account operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The local store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Another pass holds the user's sync lock.
    #[error("Sync already running for {user_id} (held by {holder} until {expires_at})")]
    AlreadyRunning {
        user_id: String,
        holder: String,
        expires_at: DateTime<Utc>,
    },

    /// The user has no sync-enabled calendar account.
    #[error("No sync-enabled calendar accounts for {user_id}")]
    NoAccounts { user_id: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an already running error from the lease that blocked us.
    pub fn already_running(lease: &LockLease) -> Self {
        Self::AlreadyRunning {
            user_id: lease.user_id.clone(),
            holder: lease.holder.clone(),
            expires_at: lease.expires_at,
        }
    }

    /// Creates a no accounts error.
    pub fn no_accounts(user_id: impl Into<String>) -> Self {
        Self::NoAccounts {
            user_id: user_id.into(),
        }
    }

    /// Returns true if a concurrent pass blocked this one.
    pub fn is_concurrency(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. })
    }
}
