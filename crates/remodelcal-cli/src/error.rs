//! CLI error types.

use thiserror::Error;

use remodelcal_core::TracingError;
use remodelcal_providers::ProviderError;
use remodelcal_sync::{StoreError, SyncError};

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A command-line value could not be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Sync error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Logging could not be set up.
    #[error("logging setup failed: {0}")]
    Tracing(#[from] TracingError),

    /// Output could not be encoded.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
