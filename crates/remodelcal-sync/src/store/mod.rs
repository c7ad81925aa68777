//! Persistence for accounts, appointments, sync status, locks and conflicts.

mod credentials;
mod local;

pub use credentials::StoreCredentials;
pub use local::LocalStore;

use chrono::{DateTime, Utc};

use remodelcal_core::{CalendarAccount, ConflictRecord, LocalEvent, ProviderKind, SyncStatus};
use remodelcal_providers::BoxFuture;

use crate::error::StoreResult;
use crate::lock::{LockLease, LockOutcome};

/// The tables the sync engine reads and writes.
///
/// Implementations must keep a provider's remote id linked to at most one
/// of a user's appointments; `insert_event` and `update_event` reject a
/// second link with [`StoreError::Duplicate`](crate::error::StoreError::Duplicate).
pub trait SyncStore: Send + Sync {
    /// Lists a user's connected accounts in provider order.
    fn accounts<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Vec<CalendarAccount>>>;

    fn account<'a>(
        &'a self,
        user_id: &'a str,
        provider: ProviderKind,
    ) -> BoxFuture<'a, StoreResult<Option<CalendarAccount>>>;

    /// Inserts or replaces the account for `(user_id, provider)`.
    fn upsert_account<'a>(&'a self, account: &'a CalendarAccount) -> BoxFuture<'a, StoreResult<()>>;

    /// Deletes an account and returns the removed row.
    fn delete_account<'a>(
        &'a self,
        user_id: &'a str,
        provider: ProviderKind,
    ) -> BoxFuture<'a, StoreResult<CalendarAccount>>;

    /// Lists a user's appointments ordered by start time.
    fn events<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Vec<LocalEvent>>>;

    fn event<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<LocalEvent>>>;

    fn insert_event<'a>(&'a self, event: &'a LocalEvent) -> BoxFuture<'a, StoreResult<()>>;

    fn update_event<'a>(&'a self, event: &'a LocalEvent) -> BoxFuture<'a, StoreResult<()>>;

    /// Deletes an appointment and returns the removed row.
    fn delete_event<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<LocalEvent>>;

    /// Writes the user's status row.
    fn put_status<'a>(&'a self, status: &'a SyncStatus) -> BoxFuture<'a, StoreResult<()>>;

    fn status<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Option<SyncStatus>>>;

    /// Takes the user's lease unless another holder has a live one.
    ///
    /// Re-acquiring with the same holder extends the lease and keeps its
    /// `acquired_at`.
    fn acquire_lock<'a>(
        &'a self,
        lease: &'a LockLease,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, StoreResult<LockOutcome>>;

    /// Deletes the user's lease if `holder` owns it. Returns true if deleted.
    fn release_lock<'a>(
        &'a self,
        user_id: &'a str,
        holder: &'a str,
    ) -> BoxFuture<'a, StoreResult<bool>>;

    /// Stores a conflict, replacing any record for the same
    /// `(local_event_id, provider)`.
    fn record_conflict<'a>(&'a self, record: &'a ConflictRecord) -> BoxFuture<'a, StoreResult<()>>;

    /// Lists a user's conflicts, oldest detection first.
    fn conflicts<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, StoreResult<Vec<ConflictRecord>>>;
}
