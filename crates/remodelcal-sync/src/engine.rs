//! Sync orchestrator.
//!
//! One pass reconciles every sync-enabled account of a user with the local
//! appointments table:
//!
//! 1. take the user's durable sync lock
//! 2. write an `in_progress` status row
//! 3. per account, list remote events in the sync window
//! 4. pull remote events that have no local row
//! 5. compare linked rows and resolve conflicts with the [`ConflictPolicy`]
//! 6. push unlinked local rows to the primary account
//! 7. write the final status and release the lock
//!
//! A provider failure aborts that provider's part of the pass only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use remodelcal_core::{
    CalendarAccount, ConflictPolicy, ConflictRecord, ConflictResolution, LocalEvent, ProviderKind,
    SyncState, SyncStatus, TimeWindow,
};
use remodelcal_providers::{CalendarProvider, ProviderError, ProviderRegistry, RemoteEvent};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::lock::{LockGuard, SyncLock};
use crate::store::SyncStore;

/// Runs sync passes.
pub struct SyncEngine {
    store: Arc<dyn SyncStore>,
    providers: Arc<ProviderRegistry>,
    lock: SyncLock,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SyncStore>,
        providers: Arc<ProviderRegistry>,
        config: SyncConfig,
    ) -> Self {
        let lock = SyncLock::new(Arc::clone(&store), config.holder.clone(), config.lock_ttl);
        Self {
            store,
            providers,
            lock,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one full pass for `user_id` and returns the final status.
    ///
    /// # Errors
    ///
    /// - [`SyncError::AlreadyRunning`] if another pass holds the user's lock,
    ///   or took it over after this pass's lease expired; the status row is
    ///   left untouched
    /// - [`SyncError::NoAccounts`] if no account is sync-enabled
    /// - [`SyncError::Provider`] with the first failure when every account failed
    /// - [`SyncError::Store`] if the store fails
    pub async fn perform_full_sync(&self, user_id: &str) -> SyncResult<SyncStatus> {
        let mut guard = self.lock.acquire(user_id).await?;
        let result = self.run_pass(user_id, &mut guard).await;
        if let Err(e) = guard.release().await {
            warn!(user_id, error = %e, "failed to release sync lock");
        }
        result
    }

    async fn run_pass(&self, user_id: &str, guard: &mut LockGuard) -> SyncResult<SyncStatus> {
        let mut status = SyncStatus::started(user_id, Utc::now());
        self.store.put_status(&status).await?;
        info!(user_id, policy = %self.config.policy, "sync started");

        let outcome = self.reconcile(user_id, &mut status, guard).await;

        let first_error = match outcome {
            Ok(first_error) => first_error,
            Err(e) if e.is_concurrency() => {
                // The lease expired and another pass owns the status row now
                warn!(user_id, error = %e, "sync lock lost, abandoning pass");
                return Err(e);
            }
            Err(e) => {
                status.fail(e.to_string(), Utc::now());
                if let Err(store_err) = self.store.put_status(&status).await {
                    warn!(user_id, error = %store_err, "failed to record sync error");
                }
                warn!(user_id, error = %e, "sync failed");
                return Err(e);
            }
        };

        let now = Utc::now();
        match first_error {
            Some(err) if status.state == SyncState::Error => {
                status.fail(err.to_string(), now);
                self.store.put_status(&status).await?;
                warn!(user_id, error = %err, "sync failed for every account");
                return Err(err.into());
            }
            Some(_) => status.finish(SyncState::Partial, now),
            None => status.finish(SyncState::Success, now),
        }
        self.store.put_status(&status).await?;

        info!(
            user_id,
            state = %status.state,
            events_synced = status.events_synced,
            pulled = status.pulled,
            pushed = status.pushed,
            updated_local = status.updated_local,
            updated_remote = status.updated_remote,
            conflicts = status.conflicts_detected,
            "sync finished"
        );
        Ok(status)
    }

    /// Reconciles every enabled account.
    ///
    /// Returns the first provider error, if any. When every account failed
    /// the status is left in [`SyncState::Error`] for the caller to finish.
    async fn reconcile(
        &self,
        user_id: &str,
        status: &mut SyncStatus,
        guard: &mut LockGuard,
    ) -> SyncResult<Option<ProviderError>> {
        let accounts: Vec<CalendarAccount> = self
            .store
            .accounts(user_id)
            .await?
            .into_iter()
            .filter(|a| a.sync_enabled)
            .collect();
        if accounts.is_empty() {
            return Err(SyncError::no_accounts(user_id));
        }

        let window = self.config.window(Utc::now());
        let mut first_error = None;

        for account in &accounts {
            let kind = account.provider;
            match self.sync_account(user_id, kind, window, status).await {
                Ok(()) => {}
                Err(SyncError::Provider(err)) => {
                    warn!(user_id, provider = %kind, error = %err, "provider sync aborted");
                    status.record_failure(kind, err.code().as_str(), err.message());
                    first_error.get_or_insert(err);
                }
                Err(other) => return Err(other),
            }
            guard.refresh().await?;
        }

        if let Some(target) = push_target(&accounts) {
            if status.provider_failed(target) {
                debug!(user_id, provider = %target, "skipping push, provider failed this pass");
            } else if let Err(e) = self.push_unlinked(user_id, target, status).await {
                match e {
                    SyncError::Provider(err) => {
                        warn!(user_id, provider = %target, error = %err, "push aborted");
                        status.record_failure(target, err.code().as_str(), err.message());
                        first_error.get_or_insert(err);
                    }
                    other => return Err(other),
                }
            }
        }

        let failed = accounts
            .iter()
            .filter(|a| status.provider_failed(a.provider))
            .count();
        if failed == accounts.len() {
            status.state = SyncState::Error;
        }
        Ok(first_error)
    }

    async fn sync_account(
        &self,
        user_id: &str,
        kind: ProviderKind,
        window: TimeWindow,
        status: &mut SyncStatus,
    ) -> SyncResult<()> {
        let provider = self.providers.get(kind)?;
        let remote_events = provider.list_events(user_id, window).await?;
        debug!(user_id, provider = %kind, count = remote_events.len(), "fetched remote events");

        // Earlier accounts may have inserted rows, so reload per account
        let locals = self.store.events(user_id).await?;
        let linked: HashMap<&str, &LocalEvent> = locals
            .iter()
            .filter_map(|e| e.remote_event_id(kind).map(|id| (id, e)))
            .collect();

        let mut seen = HashSet::new();
        for remote in &remote_events {
            if !seen.insert(remote.id.as_str()) {
                continue;
            }
            match linked.get(remote.id.as_str()) {
                None => {
                    let local = remote.to_local(user_id);
                    self.store.insert_event(&local).await?;
                    status.pulled += 1;
                    debug!(user_id, provider = %kind, remote_id = %remote.id, local_id = %local.id, "pulled remote event");
                }
                Some(local) => {
                    self.reconcile_event(provider.as_ref(), user_id, local, remote, status)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn reconcile_event(
        &self,
        provider: &dyn CalendarProvider,
        user_id: &str,
        local: &LocalEvent,
        remote: &RemoteEvent,
        status: &mut SyncStatus,
    ) -> SyncResult<()> {
        let fields = remote.conflicting_fields(local);
        if fields.is_empty() {
            return Ok(());
        }
        status.conflicts_detected += 1;

        let policy = self.config.policy;
        let resolution = match policy {
            ConflictPolicy::RemoteWins => {
                let mut updated = local.clone();
                updated.title = remote.title.clone();
                updated.start_time = remote.start;
                updated.end_time = remote.end;
                if remote.notes.is_some() {
                    updated.notes = remote.notes.clone();
                }
                updated.touch(Utc::now());
                self.store.update_event(&updated).await?;
                status.updated_local += 1;
                ConflictResolution::LocalUpdated
            }
            ConflictPolicy::LocalWins => {
                provider.update_event(user_id, &remote.id, local).await?;
                status.updated_remote += 1;
                ConflictResolution::RemoteUpdated
            }
            ConflictPolicy::Merge => {
                let mut merged = merge(local, remote);
                if !remote.conflicting_fields(&merged).is_empty() || merged.notes != remote.notes {
                    provider.update_event(user_id, &remote.id, &merged).await?;
                    status.updated_remote += 1;
                }
                if merged != *local {
                    merged.touch(Utc::now());
                    self.store.update_event(&merged).await?;
                    status.updated_local += 1;
                }
                ConflictResolution::Merged
            }
            ConflictPolicy::ManualReview => ConflictResolution::PendingReview,
        };
        if resolution.is_resolved() {
            status.conflicts_resolved += 1;
        }

        info!(
            user_id,
            provider = %remote.provider,
            local_id = %local.id,
            remote_id = %remote.id,
            ?fields,
            %policy,
            ?resolution,
            "conflict detected"
        );
        self.store
            .record_conflict(&ConflictRecord {
                user_id: user_id.to_string(),
                local_event_id: local.id.clone(),
                provider: remote.provider,
                remote_event_id: remote.id.clone(),
                fields,
                policy,
                resolution,
                detected_at: Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// Creates every unlinked local row on `target` and links it.
    async fn push_unlinked(
        &self,
        user_id: &str,
        target: ProviderKind,
        status: &mut SyncStatus,
    ) -> SyncResult<()> {
        let provider = self.providers.get(target)?;
        let unlinked: Vec<LocalEvent> = self
            .store
            .events(user_id)
            .await?
            .into_iter()
            .filter(|e| !e.is_linked())
            .collect();

        for mut event in unlinked {
            let remote = provider.create_event(user_id, &event).await?;
            event.link_remote(target, remote.id.clone());
            self.store.update_event(&event).await?;
            status.pushed += 1;
            debug!(user_id, provider = %target, local_id = %event.id, remote_id = %remote.id, "pushed local event");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("providers", &self.providers)
            .field("lock", &self.lock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The account new local rows are created on: the primary, else the first.
fn push_target(accounts: &[CalendarAccount]) -> Option<ProviderKind> {
    accounts
        .iter()
        .find(|a| a.is_primary)
        .or_else(|| accounts.first())
        .map(|a| a.provider)
}

/// Combines a linked pair field by field.
///
/// The side modified last wins; a remote event without a modification time
/// counts as newer. Empty notes are filled from the other side.
fn merge(local: &LocalEvent, remote: &RemoteEvent) -> LocalEvent {
    let remote_newer = remote.updated_at.is_none_or(|at| at > local.updated_at);
    let mut merged = local.clone();

    let (newer_notes, older_notes) = if remote_newer {
        merged.title = remote.title.clone();
        merged.start_time = remote.start;
        merged.end_time = remote.end;
        (&remote.notes, &local.notes)
    } else {
        (&local.notes, &remote.notes)
    };
    merged.notes = non_empty(newer_notes).or_else(|| non_empty(older_notes));
    merged
}

fn non_empty(notes: &Option<String>) -> Option<String> {
    notes.as_ref().filter(|n| !n.trim().is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration, TimeZone};
    use tokio::sync::Notify;

    use remodelcal_core::ConflictField;
    use remodelcal_providers::{BoxFuture, ErrorProvider, ProviderErrorCode, ProviderResult};

    use super::*;
    use crate::lock::{LockLease, LockOutcome};
    use crate::store::LocalStore;

    /// A provider backed by a list of events that applies writes in place.
    struct ScriptedProvider {
        kind: ProviderKind,
        events: Mutex<Vec<RemoteEvent>>,
        list_error: Option<ProviderErrorCode>,
        created: AtomicUsize,
        updated: AtomicUsize,
        gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
    }

    impl ScriptedProvider {
        fn new(kind: ProviderKind, events: Vec<RemoteEvent>) -> Arc<Self> {
            Arc::new(Self::build(kind, events, None))
        }

        fn failing(kind: ProviderKind, code: ProviderErrorCode) -> Arc<Self> {
            Arc::new(Self::build(kind, Vec::new(), Some(code)))
        }

        fn gated(kind: ProviderKind, entered: Arc<Notify>, release: Arc<Notify>) -> Arc<Self> {
            let provider = Self::build(kind, Vec::new(), None);
            *provider.gate.lock().unwrap() = Some((entered, release));
            Arc::new(provider)
        }

        fn build(
            kind: ProviderKind,
            events: Vec<RemoteEvent>,
            list_error: Option<ProviderErrorCode>,
        ) -> Self {
            Self {
                kind,
                events: Mutex::new(events),
                list_error,
                created: AtomicUsize::new(0),
                updated: AtomicUsize::new(0),
                gate: Mutex::new(None),
            }
        }

        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }

        fn updated(&self) -> usize {
            self.updated.load(Ordering::SeqCst)
        }

        fn event(&self, id: &str) -> RemoteEvent {
            self.events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .unwrap()
        }

        fn set(&self, event: RemoteEvent) {
            let mut events = self.events.lock().unwrap();
            events.retain(|e| e.id != event.id);
            events.push(event);
        }

        fn store(&self, id: String, event: &LocalEvent) -> RemoteEvent {
            let mut remote =
                RemoteEvent::new(self.kind, id, &event.title, event.start_time, event.end_time)
                    .with_updated_at(Utc::now());
            remote.notes = event.notes.clone();
            self.set(remote.clone());
            remote
        }
    }

    impl CalendarProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn list_events<'a>(
            &'a self,
            _user_id: &'a str,
            window: TimeWindow,
        ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
            let gate = self.gate.lock().unwrap().take();
            Box::pin(async move {
                if let Some((entered, release)) = gate {
                    entered.notify_one();
                    release.notified().await;
                }
                if let Some(code) = self.list_error {
                    return Err(ProviderError::new(code, "scripted failure").with_provider(self.kind));
                }
                Ok(self
                    .events
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|e| window.overlaps(e.start, e.end))
                    .cloned()
                    .collect())
            })
        }

        fn create_event<'a>(
            &'a self,
            _user_id: &'a str,
            event: &'a LocalEvent,
        ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            let remote = self.store(format!("{}-created-{}", self.kind, n + 1), event);
            Box::pin(async move { Ok(remote) })
        }

        fn update_event<'a>(
            &'a self,
            _user_id: &'a str,
            remote_id: &'a str,
            event: &'a LocalEvent,
        ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
            self.updated.fetch_add(1, Ordering::SeqCst);
            let remote = self.store(remote_id.to_string(), event);
            Box::pin(async move { Ok(remote) })
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        // Relative to today so every event falls inside the default sync window
        let base = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc() + Duration::days(1);
        base + Duration::days(i64::from(day)) + Duration::hours(i64::from(hour))
    }

    struct Fixture {
        store: Arc<LocalStore>,
        engine: Arc<SyncEngine>,
    }

    async fn fixture(
        providers: Vec<Arc<dyn CalendarProvider>>,
        policy: ConflictPolicy,
    ) -> Fixture {
        fixture_with(providers, SyncConfig::new().with_policy(policy)).await
    }

    async fn fixture_with(providers: Vec<Arc<dyn CalendarProvider>>, config: SyncConfig) -> Fixture {
        let store = Arc::new(LocalStore::in_memory());
        let mut registry = ProviderRegistry::new();
        for (i, provider) in providers.into_iter().enumerate() {
            let account = CalendarAccount::new(
                "user-1",
                provider.kind(),
                format!("account-{}", provider.kind()),
                "token",
            )
            .with_primary(i == 0);
            store.upsert_account(&account).await.unwrap();
            registry.register(provider);
        }
        let engine = SyncEngine::new(
            store.clone(),
            Arc::new(registry),
            config.with_holder("test:1"),
        );
        Fixture {
            store,
            engine: Arc::new(engine),
        }
    }

    #[tokio::test]
    async fn unlinked_local_event_is_created_remotely() {
        let google = ScriptedProvider::new(ProviderKind::Google, Vec::new());
        let f = fixture(vec![google.clone()], ConflictPolicy::RemoteWins).await;
        let consult = LocalEvent::new("user-1", "Consult", at(1, 15), at(1, 16));
        f.store.insert_event(&consult).await.unwrap();

        let status = f.engine.perform_full_sync("user-1").await.unwrap();

        assert_eq!(status.state, SyncState::Success);
        assert_eq!(status.pushed, 1);
        assert_eq!(status.events_synced, 1);
        assert_eq!(google.created(), 1);

        let linked = f.store.event("user-1", &consult.id).await.unwrap().unwrap();
        assert_eq!(linked.remote_event_id(ProviderKind::Google), Some("google-created-1"));
        assert_eq!(google.event("google-created-1").title, "Consult");
    }

    #[tokio::test]
    async fn remote_event_is_pulled_exactly_once() {
        let site_visit = RemoteEvent::new(ProviderKind::Google, "g123", "Site Visit", at(2, 10), at(2, 11));
        let google = ScriptedProvider::new(ProviderKind::Google, vec![site_visit.clone(), site_visit]);
        let f = fixture(vec![google.clone()], ConflictPolicy::RemoteWins).await;

        let status = f.engine.perform_full_sync("user-1").await.unwrap();
        assert_eq!(status.pulled, 1);

        let events = f.store.events("user-1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Site Visit");
        assert_eq!(events[0].remote_event_id(ProviderKind::Google), Some("g123"));
        // Pulled rows are never echoed back
        assert_eq!(google.created(), 0);
    }

    #[tokio::test]
    async fn second_pass_is_idempotent_under_every_policy() {
        for policy in [
            ConflictPolicy::RemoteWins,
            ConflictPolicy::LocalWins,
            ConflictPolicy::Merge,
            ConflictPolicy::ManualReview,
        ] {
            let google = ScriptedProvider::new(
                ProviderKind::Google,
                vec![RemoteEvent::new(ProviderKind::Google, "g1", "Demo", at(3, 9), at(3, 12))],
            );
            let outlook = ScriptedProvider::new(
                ProviderKind::Outlook,
                vec![RemoteEvent::new(ProviderKind::Outlook, "o1", "Tile pickup", at(4, 8), at(4, 9))],
            );
            let f = fixture(vec![google.clone(), outlook.clone()], policy).await;
            f.store
                .insert_event(&LocalEvent::new("user-1", "Consult", at(1, 15), at(1, 16)))
                .await
                .unwrap();

            let first = f.engine.perform_full_sync("user-1").await.unwrap();
            assert_eq!(first.events_synced, 3, "{policy}");

            let second = f.engine.perform_full_sync("user-1").await.unwrap();
            assert_eq!(second.state, SyncState::Success, "{policy}");
            assert_eq!(second.events_synced, 0, "{policy}");
            assert_eq!(second.conflicts_detected, 0, "{policy}");
            assert_eq!(f.store.events("user-1").await.unwrap().len(), 3, "{policy}");
        }
    }

    #[tokio::test]
    async fn concurrent_pass_fails_with_concurrency_error() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let google = ScriptedProvider::gated(ProviderKind::Google, entered.clone(), release.clone());
        let f = fixture(vec![google], ConflictPolicy::RemoteWins).await;

        let first = tokio::spawn({
            let engine = f.engine.clone();
            async move { engine.perform_full_sync("user-1").await }
        });
        entered.notified().await;

        let err = f.engine.perform_full_sync("user-1").await.unwrap_err();
        assert!(err.is_concurrency());
        let running = f.store.status("user-1").await.unwrap().unwrap();
        assert_eq!(running.state, SyncState::InProgress);

        release.notify_one();
        let status = first.await.unwrap().unwrap();
        assert_eq!(status.state, SyncState::Success);

        // The lock is released after the pass
        f.engine.perform_full_sync("user-1").await.unwrap();
    }

    #[tokio::test]
    async fn pass_that_loses_its_lease_leaves_status_alone() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let google = ScriptedProvider::gated(ProviderKind::Google, entered.clone(), release.clone());
        let f = fixture_with(
            vec![google],
            SyncConfig::new().with_lock_ttl(Duration::milliseconds(5)),
        )
        .await;

        let first = tokio::spawn({
            let engine = f.engine.clone();
            async move { engine.perform_full_sync("user-1").await }
        });
        entered.notified().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Another instance takes the expired lease and starts its own pass
        let now = Utc::now();
        let rival = LockLease::new("user-1", "web-2:7", now, Duration::minutes(10));
        assert!(matches!(
            f.store.acquire_lock(&rival, now).await.unwrap(),
            LockOutcome::Acquired(_)
        ));
        f.store.put_status(&SyncStatus::started("user-1", now)).await.unwrap();

        release.notify_one();
        let err = first.await.unwrap().unwrap_err();
        assert!(err.is_concurrency());

        let status = f.store.status("user-1").await.unwrap().unwrap();
        assert_eq!(status.state, SyncState::InProgress);
        assert_eq!(status.started_at, now);
        // The rival still holds the lock
        assert!(f.store.release_lock("user-1", "web-2:7").await.unwrap());
    }

    async fn conflicting_pair(policy: ConflictPolicy) -> (Fixture, Arc<ScriptedProvider>, LocalEvent) {
        let local_edit = Utc::now() - Duration::hours(2);
        let local = LocalEvent::new("user-1", "Kitchen consult", at(5, 14), at(5, 15))
            .with_remote_id(ProviderKind::Google, "g1")
            .with_notes("Bring samples")
            .with_updated_at(local_edit);
        let remote = RemoteEvent::new(ProviderKind::Google, "g1", "Kitchen consult", at(5, 16), at(5, 17))
            .with_updated_at(local_edit + Duration::hours(1));
        let google = ScriptedProvider::new(ProviderKind::Google, vec![remote]);
        let f = fixture(vec![google.clone()], policy).await;
        f.store.insert_event(&local).await.unwrap();
        (f, google, local)
    }

    #[tokio::test]
    async fn remote_wins_overwrites_local() {
        let (f, google, local) = conflicting_pair(ConflictPolicy::RemoteWins).await;
        let status = f.engine.perform_full_sync("user-1").await.unwrap();

        assert_eq!((status.conflicts_detected, status.conflicts_resolved), (1, 1));
        assert_eq!(status.updated_local, 1);
        assert_eq!(google.updated(), 0);

        let stored = f.store.event("user-1", &local.id).await.unwrap().unwrap();
        assert_eq!(stored.start_time, at(5, 16));
        assert_eq!(stored.notes.as_deref(), Some("Bring samples"));

        let conflicts = f.store.conflicts("user-1").await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].fields,
            vec![ConflictField::StartTime, ConflictField::EndTime]
        );
        assert_eq!(conflicts[0].resolution, ConflictResolution::LocalUpdated);
    }

    #[tokio::test]
    async fn local_wins_pushes_to_provider() {
        let (f, google, local) = conflicting_pair(ConflictPolicy::LocalWins).await;
        let status = f.engine.perform_full_sync("user-1").await.unwrap();

        assert_eq!(status.updated_remote, 1);
        assert_eq!(google.updated(), 1);
        assert_eq!(google.event("g1").start, at(5, 14));

        let stored = f.store.event("user-1", &local.id).await.unwrap().unwrap();
        assert_eq!(stored, local);
        assert_eq!(
            f.store.conflicts("user-1").await.unwrap()[0].resolution,
            ConflictResolution::RemoteUpdated
        );
    }

    #[tokio::test]
    async fn merge_takes_newer_side_and_fills_notes() {
        let (f, google, local) = conflicting_pair(ConflictPolicy::Merge).await;
        let status = f.engine.perform_full_sync("user-1").await.unwrap();

        // Remote is newer: its times win, local notes fill the remote
        let stored = f.store.event("user-1", &local.id).await.unwrap().unwrap();
        assert_eq!(stored.start_time, at(5, 16));
        assert_eq!(stored.notes.as_deref(), Some("Bring samples"));
        assert_eq!(google.event("g1").notes.as_deref(), Some("Bring samples"));
        assert_eq!((status.updated_local, status.updated_remote), (1, 1));
        assert_eq!(
            f.store.conflicts("user-1").await.unwrap()[0].resolution,
            ConflictResolution::Merged
        );
    }

    #[tokio::test]
    async fn merge_keeps_newer_local_edit() {
        let (f, google, local) = conflicting_pair(ConflictPolicy::Merge).await;
        let mut edited = local.clone();
        edited.touch(Utc::now());
        f.store.update_event(&edited).await.unwrap();

        let status = f.engine.perform_full_sync("user-1").await.unwrap();
        assert_eq!((status.updated_local, status.updated_remote), (0, 1));
        assert_eq!(google.event("g1").start, at(5, 14));
    }

    #[tokio::test]
    async fn manual_review_changes_nothing() {
        let (f, google, local) = conflicting_pair(ConflictPolicy::ManualReview).await;
        let status = f.engine.perform_full_sync("user-1").await.unwrap();

        assert_eq!((status.conflicts_detected, status.conflicts_resolved), (1, 0));
        assert_eq!(status.events_synced, 0);
        assert_eq!(google.updated(), 0);
        assert_eq!(f.store.event("user-1", &local.id).await.unwrap().unwrap(), local);
        assert_eq!(
            f.store.conflicts("user-1").await.unwrap()[0].resolution,
            ConflictResolution::PendingReview
        );
    }

    #[tokio::test]
    async fn failing_account_makes_pass_partial() {
        let google = ScriptedProvider::new(ProviderKind::Google, Vec::new());
        let outlook = ScriptedProvider::failing(ProviderKind::Outlook, ProviderErrorCode::AuthenticationFailed);
        let f = fixture(vec![google.clone(), outlook], ConflictPolicy::RemoteWins).await;
        f.store
            .insert_event(&LocalEvent::new("user-1", "Consult", at(1, 15), at(1, 16)))
            .await
            .unwrap();

        let status = f.engine.perform_full_sync("user-1").await.unwrap();
        assert_eq!(status.state, SyncState::Partial);
        assert_eq!(status.failures.len(), 1);
        assert_eq!(status.failures[0].provider, ProviderKind::Outlook);
        assert_eq!(status.failures[0].code, "authentication_failed");
        assert_eq!(status.pushed, 1);
    }

    #[tokio::test]
    async fn push_is_skipped_when_primary_listing_failed() {
        let google = ScriptedProvider::failing(ProviderKind::Google, ProviderErrorCode::ServerError);
        let outlook = ScriptedProvider::new(ProviderKind::Outlook, Vec::new());
        let f = fixture(vec![google, outlook.clone()], ConflictPolicy::RemoteWins).await;
        let consult = LocalEvent::new("user-1", "Consult", at(1, 15), at(1, 16));
        f.store.insert_event(&consult).await.unwrap();

        let status = f.engine.perform_full_sync("user-1").await.unwrap();
        assert_eq!(status.state, SyncState::Partial);
        assert_eq!(status.pushed, 0);
        assert_eq!(outlook.created(), 0);
        assert!(!f.store.event("user-1", &consult.id).await.unwrap().unwrap().is_linked());
    }

    #[tokio::test]
    async fn every_account_failing_is_an_error() {
        let err = ProviderError::authentication("adapter not configured");
        let f = fixture(
            vec![Arc::new(ErrorProvider::new(ProviderKind::Apple, &err))],
            ConflictPolicy::RemoteWins,
        )
        .await;

        let err = f.engine.perform_full_sync("user-1").await.unwrap_err();
        assert!(matches!(err, SyncError::Provider(ref e) if e.is_auth()));

        let status = f.store.status("user-1").await.unwrap().unwrap();
        assert_eq!(status.state, SyncState::Error);
        assert!(status.finished_at.is_some());
        assert!(status.message.unwrap().contains("adapter not configured"));

        // Lock released even on failure
        assert!(!f.engine.perform_full_sync("user-1").await.unwrap_err().is_concurrency());
    }

    #[tokio::test]
    async fn no_enabled_accounts_is_an_error() {
        let f = fixture(Vec::new(), ConflictPolicy::RemoteWins).await;
        let err = f.engine.perform_full_sync("user-1").await.unwrap_err();
        assert!(matches!(err, SyncError::NoAccounts { .. }));
        let status = f.store.status("user-1").await.unwrap().unwrap();
        assert_eq!(status.state, SyncState::Error);
    }

    #[tokio::test]
    async fn disabled_accounts_are_skipped() {
        let google = ScriptedProvider::new(
            ProviderKind::Google,
            vec![RemoteEvent::new(ProviderKind::Google, "g1", "Demo", at(3, 9), at(3, 12))],
        );
        let outlook = ScriptedProvider::new(
            ProviderKind::Outlook,
            vec![RemoteEvent::new(ProviderKind::Outlook, "o1", "Permit", at(4, 9), at(4, 10))],
        );
        let f = fixture(vec![google, outlook], ConflictPolicy::RemoteWins).await;
        let account = f
            .store
            .account("user-1", ProviderKind::Outlook)
            .await
            .unwrap()
            .unwrap()
            .with_sync_enabled(false);
        f.store.upsert_account(&account).await.unwrap();

        let status = f.engine.perform_full_sync("user-1").await.unwrap();
        assert_eq!(status.pulled, 1);
    }

    #[test]
    fn push_target_prefers_primary() {
        let google = CalendarAccount::new("u", ProviderKind::Google, "a", "t");
        let outlook = CalendarAccount::new("u", ProviderKind::Outlook, "b", "t").with_primary(true);
        assert_eq!(
            push_target(&[google.clone(), outlook]),
            Some(ProviderKind::Outlook)
        );
        assert_eq!(push_target(&[google]), Some(ProviderKind::Google));
        assert_eq!(push_target(&[]), None);
    }

    #[test]
    fn merge_without_remote_timestamp_prefers_remote() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap();
        let local = LocalEvent::new("u", "Consult", start, start + Duration::hours(1))
            .with_notes("gate code 1234");
        let remote = RemoteEvent::new(
            ProviderKind::Apple,
            "A1",
            "Consult (rescheduled)",
            start + Duration::hours(2),
            start + Duration::hours(3),
        )
        .with_notes("  ");

        let merged = merge(&local, &remote);
        assert_eq!(merged.title, "Consult (rescheduled)");
        assert_eq!(merged.start_time, start + Duration::hours(2));
        assert_eq!(merged.notes.as_deref(), Some("gate code 1234"));
    }
}
