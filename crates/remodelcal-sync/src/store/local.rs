//! In-memory store with optional JSON file persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use remodelcal_core::{CalendarAccount, ConflictRecord, LocalEvent, ProviderKind, SyncStatus};
use remodelcal_providers::BoxFuture;

use crate::error::{StoreError, StoreResult};
use crate::lock::{LockLease, LockOutcome};

use super::SyncStore;

/// Every table, as written to the store file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tables {
    calendar_accounts: Vec<CalendarAccount>,
    appointments: Vec<LocalEvent>,
    calendar_sync_status: BTreeMap<String, SyncStatus>,
    calendar_sync_locks: BTreeMap<String, LockLease>,
    calendar_sync_conflicts: Vec<ConflictRecord>,
}

impl Tables {
    fn upsert_account(&mut self, account: &CalendarAccount) {
        match self
            .calendar_accounts
            .iter_mut()
            .find(|a| a.user_id == account.user_id && a.provider == account.provider)
        {
            Some(existing) => *existing = account.clone(),
            None => self.calendar_accounts.push(account.clone()),
        }
    }

    fn delete_account(&mut self, user_id: &str, provider: ProviderKind) -> StoreResult<CalendarAccount> {
        let index = self
            .calendar_accounts
            .iter()
            .position(|a| a.user_id == user_id && a.provider == provider)
            .ok_or_else(|| StoreError::not_found("account", format!("{}/{}", user_id, provider)))?;
        Ok(self.calendar_accounts.remove(index))
    }

    /// Rejects a remote id already linked to another of the user's rows.
    fn check_links(&self, event: &LocalEvent) -> StoreResult<()> {
        for (provider, remote_id) in &event.remote_ids {
            let taken = self.appointments.iter().any(|other| {
                other.id != event.id
                    && other.user_id == event.user_id
                    && other.remote_event_id(*provider) == Some(remote_id.as_str())
            });
            if taken {
                return Err(StoreError::duplicate(
                    "remote event link",
                    format!("{}:{}", provider, remote_id),
                ));
            }
        }
        Ok(())
    }

    fn insert_event(&mut self, event: &LocalEvent) -> StoreResult<()> {
        if self.appointments.iter().any(|e| e.id == event.id) {
            return Err(StoreError::duplicate("event", &event.id));
        }
        self.check_links(event)?;
        self.appointments.push(event.clone());
        Ok(())
    }

    fn update_event(&mut self, event: &LocalEvent) -> StoreResult<()> {
        self.check_links(event)?;
        let existing = self
            .appointments
            .iter_mut()
            .find(|e| e.id == event.id && e.user_id == event.user_id)
            .ok_or_else(|| StoreError::not_found("event", &event.id))?;
        *existing = event.clone();
        Ok(())
    }

    fn delete_event(&mut self, user_id: &str, event_id: &str) -> StoreResult<LocalEvent> {
        let index = self
            .appointments
            .iter()
            .position(|e| e.id == event_id && e.user_id == user_id)
            .ok_or_else(|| StoreError::not_found("event", event_id))?;
        self.calendar_sync_conflicts
            .retain(|c| c.local_event_id != event_id);
        Ok(self.appointments.remove(index))
    }

    fn acquire_lock(&mut self, lease: &LockLease, now: DateTime<Utc>) -> LockOutcome {
        let mut lease = lease.clone();
        if let Some(existing) = self.calendar_sync_locks.get(&lease.user_id) {
            if existing.holder == lease.holder {
                lease.acquired_at = existing.acquired_at;
            } else if !existing.is_expired(now) {
                return LockOutcome::Held(existing.clone());
            }
        }
        self.calendar_sync_locks
            .insert(lease.user_id.clone(), lease.clone());
        LockOutcome::Acquired(lease)
    }

    fn release_lock(&mut self, user_id: &str, holder: &str) -> bool {
        match self.calendar_sync_locks.get(user_id) {
            Some(lease) if lease.holder == holder => {
                self.calendar_sync_locks.remove(user_id);
                true
            }
            _ => false,
        }
    }

    fn record_conflict(&mut self, record: &ConflictRecord) {
        self.calendar_sync_conflicts.retain(|c| {
            !(c.local_event_id == record.local_event_id && c.provider == record.provider)
        });
        self.calendar_sync_conflicts.push(record.clone());
    }
}

/// A [`SyncStore`] kept in memory, optionally persisted to a JSON file.
///
/// Every successful write rewrites the whole file atomically. A write that
/// fails to persist leaves the in-memory tables unchanged.
#[derive(Debug)]
pub struct LocalStore {
    tables: RwLock<Tables>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Creates an empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            path: None,
        }
    }

    /// Opens the store file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let tables: Tables = serde_json::from_str(&content)?;
            debug!(
                path = %path.display(),
                accounts = tables.calendar_accounts.len(),
                appointments = tables.appointments.len(),
                "loaded store"
            );
            tables
        } else {
            debug!(path = %path.display(), "no store file yet, starting empty");
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path),
        })
    }

    /// Returns the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read().await;
        f(&tables)
    }

    async fn write<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *tables = next;
        Ok(out)
    }

    fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(tables)?;
        fs::write(&temp_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp_path, path)?;
        trace!(path = %path.display(), "store persisted");
        Ok(())
    }
}

impl SyncStore for LocalStore {
    fn accounts<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Vec<CalendarAccount>>> {
        Box::pin(async move {
            Ok(self
                .read(|t| {
                    let mut accounts: Vec<CalendarAccount> = t
                        .calendar_accounts
                        .iter()
                        .filter(|a| a.user_id == user_id)
                        .cloned()
                        .collect();
                    accounts.sort_by_key(|a| a.provider);
                    accounts
                })
                .await)
        })
    }

    fn account<'a>(
        &'a self,
        user_id: &'a str,
        provider: ProviderKind,
    ) -> BoxFuture<'a, StoreResult<Option<CalendarAccount>>> {
        Box::pin(async move {
            Ok(self
                .read(|t| {
                    t.calendar_accounts
                        .iter()
                        .find(|a| a.user_id == user_id && a.provider == provider)
                        .cloned()
                })
                .await)
        })
    }

    fn upsert_account<'a>(&'a self, account: &'a CalendarAccount) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.write(|t| {
                t.upsert_account(account);
                Ok(())
            })
            .await
        })
    }

    fn delete_account<'a>(
        &'a self,
        user_id: &'a str,
        provider: ProviderKind,
    ) -> BoxFuture<'a, StoreResult<CalendarAccount>> {
        Box::pin(async move { self.write(|t| t.delete_account(user_id, provider)).await })
    }

    fn events<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Vec<LocalEvent>>> {
        Box::pin(async move {
            Ok(self
                .read(|t| {
                    let mut events: Vec<LocalEvent> = t
                        .appointments
                        .iter()
                        .filter(|e| e.user_id == user_id)
                        .cloned()
                        .collect();
                    events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
                    events
                })
                .await)
        })
    }

    fn event<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<LocalEvent>>> {
        Box::pin(async move {
            Ok(self
                .read(|t| {
                    t.appointments
                        .iter()
                        .find(|e| e.id == event_id && e.user_id == user_id)
                        .cloned()
                })
                .await)
        })
    }

    fn insert_event<'a>(&'a self, event: &'a LocalEvent) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.write(|t| t.insert_event(event)).await })
    }

    fn update_event<'a>(&'a self, event: &'a LocalEvent) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.write(|t| t.update_event(event)).await })
    }

    fn delete_event<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<LocalEvent>> {
        Box::pin(async move { self.write(|t| t.delete_event(user_id, event_id)).await })
    }

    fn put_status<'a>(&'a self, status: &'a SyncStatus) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.write(|t| {
                t.calendar_sync_status
                    .insert(status.user_id.clone(), status.clone());
                Ok(())
            })
            .await
        })
    }

    fn status<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Option<SyncStatus>>> {
        Box::pin(async move {
            Ok(self
                .read(|t| t.calendar_sync_status.get(user_id).cloned())
                .await)
        })
    }

    fn acquire_lock<'a>(
        &'a self,
        lease: &'a LockLease,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, StoreResult<LockOutcome>> {
        Box::pin(async move { self.write(|t| Ok(t.acquire_lock(lease, now))).await })
    }

    fn release_lock<'a>(
        &'a self,
        user_id: &'a str,
        holder: &'a str,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { self.write(|t| Ok(t.release_lock(user_id, holder))).await })
    }

    fn record_conflict<'a>(&'a self, record: &'a ConflictRecord) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.write(|t| {
                t.record_conflict(record);
                Ok(())
            })
            .await
        })
    }

    fn conflicts<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Vec<ConflictRecord>>> {
        Box::pin(async move {
            Ok(self
                .read(|t| {
                    let mut conflicts: Vec<ConflictRecord> = t
                        .calendar_sync_conflicts
                        .iter()
                        .filter(|c| c.user_id == user_id)
                        .cloned()
                        .collect();
                    conflicts.sort_by_key(|c| c.detected_at);
                    conflicts
                })
                .await)
        })
    }
}
