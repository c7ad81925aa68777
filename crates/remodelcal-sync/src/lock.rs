//! Durable per-user sync lock.
//!
//! A lease row in the store marks a user's sync as running. Leases expire
//! after a TTL, so a pass that crashed without releasing its lease blocks
//! the user only until the lease runs out.

use std::fs;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::store::SyncStore;

/// Default lease lifetime.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 600;

/// A sync lease (the `calendar_sync_locks` row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLease {
    pub user_id: String,
    /// Identifies the pass holding the lease (`host:pid/pass`).
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockLease {
    pub fn new(
        user_id: impl Into<String>,
        holder: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            holder: holder.into(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns true once the lease no longer blocks other holders.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of trying to take a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lease is ours.
    Acquired(LockLease),
    /// Someone else holds a live lease.
    Held(LockLease),
}

/// Returns the default holder id for this process: `hostname:pid`.
pub fn default_holder() -> String {
    format!("{}:{}", hostname(), std::process::id())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Takes and releases per-user sync leases.
pub struct SyncLock {
    store: Arc<dyn SyncStore>,
    holder: String,
    ttl: Duration,
}

impl SyncLock {
    pub fn new(store: Arc<dyn SyncStore>, holder: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            holder: holder.into(),
            ttl,
        }
    }

    /// Returns the process holder id.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Acquires the user's lease for one pass.
    ///
    /// Every call gets its own pass id appended to the holder, so two passes
    /// started by the same process still exclude each other.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] if a live lease is held by
    /// another pass.
    pub async fn acquire(&self, user_id: &str) -> SyncResult<LockGuard> {
        let pass = Uuid::new_v4().simple().to_string();
        let holder = format!("{}/{}", self.holder, &pass[..8]);
        let now = Utc::now();

        match self
            .store
            .acquire_lock(&LockLease::new(user_id, holder, now, self.ttl), now)
            .await?
        {
            LockOutcome::Acquired(lease) => {
                debug!(user_id, holder = %lease.holder, expires_at = %lease.expires_at, "sync lock acquired");
                Ok(LockGuard {
                    store: Arc::clone(&self.store),
                    lease,
                    ttl: self.ttl,
                    released: false,
                })
            }
            LockOutcome::Held(existing) => {
                debug!(user_id, holder = %existing.holder, "sync lock held elsewhere");
                Err(SyncError::already_running(&existing))
            }
        }
    }
}

impl std::fmt::Debug for SyncLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLock")
            .field("holder", &self.holder)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// A held lease. Release it with [`LockGuard::release`].
///
/// Dropping the guard without releasing leaves the lease to expire.
pub struct LockGuard {
    store: Arc<dyn SyncStore>,
    lease: LockLease,
    ttl: Duration,
    released: bool,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lease", &self.lease)
            .field("ttl", &self.ttl)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    pub fn lease(&self) -> &LockLease {
        &self.lease
    }

    /// Extends the lease by another TTL from now.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] if the lease expired and
    /// another pass took it over.
    pub async fn refresh(&mut self) -> SyncResult<()> {
        let now = Utc::now();
        let renewed = LockLease::new(&self.lease.user_id, &self.lease.holder, now, self.ttl);
        match self.store.acquire_lock(&renewed, now).await? {
            LockOutcome::Acquired(lease) => {
                self.lease = lease;
                Ok(())
            }
            LockOutcome::Held(existing) => {
                warn!(
                    user_id = %self.lease.user_id,
                    holder = %existing.holder,
                    "sync lock was taken over after expiry"
                );
                Err(SyncError::already_running(&existing))
            }
        }
    }

    /// Deletes the lease row.
    pub async fn release(mut self) -> SyncResult<()> {
        self.released = true;
        let removed = self
            .store
            .release_lock(&self.lease.user_id, &self.lease.holder)
            .await?;
        if removed {
            debug!(user_id = %self.lease.user_id, "sync lock released");
        } else {
            warn!(user_id = %self.lease.user_id, "sync lock was no longer ours at release");
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                user_id = %self.lease.user_id,
                expires_at = %self.lease.expires_at,
                "sync lock dropped without release; it will expire"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LocalStore, SyncStore};

    fn lock(store: &Arc<LocalStore>, holder: &str) -> SyncLock {
        SyncLock::new(store.clone(), holder, Duration::minutes(10))
    }

    #[tokio::test]
    async fn second_pass_is_rejected_until_release() {
        let store = Arc::new(LocalStore::in_memory());
        let lock = lock(&store, "web-1:42");

        let guard = lock.acquire("user-1").await.unwrap();
        assert!(guard.lease().holder.starts_with("web-1:42/"));

        let err = lock.acquire("user-1").await.unwrap_err();
        assert!(err.is_concurrency());

        // Other users are independent
        lock.acquire("user-2").await.unwrap().release().await.unwrap();

        guard.release().await.unwrap();
        lock.acquire("user-1").await.unwrap().release().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lease_is_taken_over() {
        let store = Arc::new(LocalStore::in_memory());
        let stale = LockLease::new(
            "user-1",
            "crashed:1/deadbeef",
            Utc::now() - Duration::minutes(30),
            Duration::minutes(10),
        );
        assert_eq!(
            store.acquire_lock(&stale, stale.acquired_at).await.unwrap(),
            LockOutcome::Acquired(stale.clone())
        );

        let guard = lock(&store, "web-1:42").acquire("user-1").await.unwrap();
        assert_ne!(guard.lease().holder, stale.holder);
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn refresh_extends_own_lease() {
        let store = Arc::new(LocalStore::in_memory());
        let lock = SyncLock::new(store.clone(), "web-1:42", Duration::seconds(30));
        let mut guard = lock.acquire("user-1").await.unwrap();
        let first = guard.lease().clone();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        guard.refresh().await.unwrap();

        assert_eq!(guard.lease().holder, first.holder);
        assert_eq!(guard.lease().acquired_at, first.acquired_at);
        assert!(guard.lease().expires_at > first.expires_at);
        guard.release().await.unwrap();
    }

    #[test]
    fn default_holder_has_pid() {
        let holder = default_holder();
        assert!(holder.ends_with(&format!(":{}", std::process::id())));
    }
}
