//! Conflict policy and conflict records.
//!
//! A conflict is a field-level mismatch between a linked local appointment
//! and its remote event. Conflicts are never surfaced as errors: the sync
//! engine resolves them with a [`ConflictPolicy`] and stores a
//! [`ConflictRecord`] describing what it did.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderKind;

/// How a sync pass resolves a local/remote mismatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Push the local version to the provider.
    LocalWins,
    /// Overwrite the local copy with the remote version.
    #[default]
    RemoteWins,
    /// Take each field from the more recently modified side.
    Merge,
    /// Leave both sides untouched and record the conflict for review.
    ManualReview,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalWins => "local_wins",
            Self::RemoteWins => "remote_wins",
            Self::Merge => "merge",
            Self::ManualReview => "manual_review",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conflict policy: {0}")]
pub struct ParseConflictPolicyError(pub String);

impl FromStr for ConflictPolicy {
    type Err = ParseConflictPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local_wins" | "local" => Ok(Self::LocalWins),
            "remote_wins" | "remote" => Ok(Self::RemoteWins),
            "merge" => Ok(Self::Merge),
            "manual_review" | "manual" => Ok(Self::ManualReview),
            other => Err(ParseConflictPolicyError(other.to_string())),
        }
    }
}

/// A field compared during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictField {
    Title,
    StartTime,
    EndTime,
}

/// What the engine did about a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The local row was overwritten.
    LocalUpdated,
    /// The remote event was overwritten.
    RemoteUpdated,
    /// Fields were combined; one or both sides were written.
    Merged,
    /// Nothing was written.
    PendingReview,
}

impl ConflictResolution {
    /// Returns true if the resolution wrote to either side.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::PendingReview)
    }
}

/// A detected conflict (the `calendar_sync_conflicts` row).
///
/// Keyed by `(local_event_id, provider)`; a newer detection replaces the
/// previous record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub user_id: String,
    pub local_event_id: String,
    pub provider: ProviderKind,
    pub remote_event_id: String,
    pub fields: Vec<ConflictField>,
    pub policy: ConflictPolicy,
    pub resolution: ConflictResolution,
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_remote_wins() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::RemoteWins);
    }

    #[test]
    fn parse_policy_names() {
        assert_eq!("remote_wins".parse::<ConflictPolicy>(), Ok(ConflictPolicy::RemoteWins));
        assert_eq!("local-wins".parse::<ConflictPolicy>(), Ok(ConflictPolicy::LocalWins));
        assert_eq!("Merge".parse::<ConflictPolicy>(), Ok(ConflictPolicy::Merge));
        assert_eq!("manual".parse::<ConflictPolicy>(), Ok(ConflictPolicy::ManualReview));
        assert!("coin_flip".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn policy_serde_matches_display() {
        for policy in [
            ConflictPolicy::LocalWins,
            ConflictPolicy::RemoteWins,
            ConflictPolicy::Merge,
            ConflictPolicy::ManualReview,
        ] {
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, format!("\"{}\"", policy));
        }
    }

    #[test]
    fn pending_review_is_not_resolved() {
        assert!(!ConflictResolution::PendingReview.is_resolved());
        assert!(ConflictResolution::Merged.is_resolved());
    }
}
