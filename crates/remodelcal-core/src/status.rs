//! Sync pass status (the `calendar_sync_status` row).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

/// Lifecycle state of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// The pass is running.
    InProgress,
    /// Every enabled account synced.
    Success,
    /// Some accounts failed, the rest synced.
    Partial,
    /// The pass failed.
    Error,
}

impl SyncState {
    /// Returns the storage name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }

    /// Returns true once the pass has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider whose part of the pass was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: ProviderKind,
    /// Error code (e.g. `authentication_failed`).
    pub code: String,
    pub message: String,
}

/// Summary of one sync pass for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub user_id: String,
    pub state: SyncState,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// `pulled + pushed + updated_local + updated_remote`.
    pub events_synced: u32,
    /// Remote events inserted locally.
    pub pulled: u32,
    /// Local events created remotely.
    pub pushed: u32,
    /// Local rows overwritten while resolving conflicts.
    pub updated_local: u32,
    /// Remote events overwritten while resolving conflicts.
    pub updated_remote: u32,
    pub conflicts_detected: u32,
    /// Conflicts whose resolution changed one side.
    pub conflicts_resolved: u32,
    #[serde(default)]
    pub failures: Vec<ProviderFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncStatus {
    /// Creates the `in_progress` row written at the start of a pass.
    pub fn started(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            state: SyncState::InProgress,
            started_at: now,
            finished_at: None,
            events_synced: 0,
            pulled: 0,
            pushed: 0,
            updated_local: 0,
            updated_remote: 0,
            conflicts_detected: 0,
            conflicts_resolved: 0,
            failures: Vec::new(),
            message: None,
        }
    }

    /// Moves the status to a terminal state and totals the counts.
    pub fn finish(&mut self, state: SyncState, now: DateTime<Utc>) {
        self.state = state;
        self.finished_at = Some(now);
        self.events_synced =
            self.pulled + self.pushed + self.updated_local + self.updated_remote;
    }

    /// Marks the pass failed with a message.
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.message = Some(message.into());
        self.finish(SyncState::Error, now);
    }

    /// Records an aborted provider.
    pub fn record_failure(
        &mut self,
        provider: ProviderKind,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.failures.push(ProviderFailure {
            provider,
            code: code.into(),
            message: message.into(),
        });
    }

    /// Returns true if a provider's part of the pass was aborted.
    pub fn provider_failed(&self, provider: ProviderKind) -> bool {
        self.failures.iter().any(|f| f.provider == provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn started_status() {
        let status = SyncStatus::started("user-1", now());
        assert_eq!(status.state, SyncState::InProgress);
        assert!(!status.state.is_terminal());
        assert!(status.finished_at.is_none());
        assert_eq!(status.events_synced, 0);
    }

    #[test]
    fn finish_totals_counts() {
        let mut status = SyncStatus::started("user-1", now());
        status.pulled = 2;
        status.pushed = 1;
        status.updated_local = 3;
        status.updated_remote = 1;
        status.finish(SyncState::Success, now());

        assert_eq!(status.events_synced, 7);
        assert_eq!(status.finished_at, Some(now()));
        assert!(status.state.is_terminal());
    }

    #[test]
    fn failures_are_tracked_per_provider() {
        let mut status = SyncStatus::started("user-1", now());
        status.record_failure(ProviderKind::Outlook, "authentication_failed", "token expired");
        status.finish(SyncState::Partial, now());

        assert!(status.provider_failed(ProviderKind::Outlook));
        assert!(!status.provider_failed(ProviderKind::Google));
    }

    #[test]
    fn fail_sets_message() {
        let mut status = SyncStatus::started("user-1", now());
        status.fail("store unavailable", now());
        assert_eq!(status.state, SyncState::Error);
        assert_eq!(status.message.as_deref(), Some("store unavailable"));
    }

    #[test]
    fn state_names() {
        assert_eq!(SyncState::InProgress.to_string(), "in_progress");
        let json = serde_json::to_string(&SyncState::Partial).unwrap();
        assert_eq!(json, "\"partial\"");
    }
}
