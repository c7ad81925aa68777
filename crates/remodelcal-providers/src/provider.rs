//! CalendarProvider trait definition.
//!
//! This module defines the [`CalendarProvider`] trait, the seam between the
//! sync engine and a calendar vendor, along with the [`ProviderRegistry`]
//! that maps each [`ProviderKind`] to its adapter.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use remodelcal_core::{LocalEvent, ProviderKind, TimeWindow};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::remote_event::RemoteEvent;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so adapters can live behind
/// `Arc<dyn CalendarProvider>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core abstraction for calendar vendors.
///
/// # Implementation Notes
///
/// - Implementations resolve the user's credentials themselves (usually
///   through a [`TokenManager`](crate::tokens::TokenManager)) and fail with
///   an authentication error when no usable token can be obtained
/// - `list_events` pages through vendor results internally and drops
///   cancelled events
/// - Nothing retries; a failed call is returned to the caller as is
pub trait CalendarProvider: Send + Sync {
    /// Returns the vendor this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Lists the user's remote events overlapping `window`.
    fn list_events<'a>(
        &'a self,
        user_id: &'a str,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>>;

    /// Creates a remote copy of a local appointment.
    ///
    /// The returned event carries the vendor-assigned id.
    fn create_event<'a>(
        &'a self,
        user_id: &'a str,
        event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>>;

    /// Overwrites an existing remote event with the local version.
    fn update_event<'a>(
        &'a self,
        user_id: &'a str,
        remote_id: &'a str,
        event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>>;
}

/// Adapters indexed by provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderKind, Arc<dyn CalendarProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own kind, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn CalendarProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Returns the adapter for a provider.
    pub fn get(&self, kind: ProviderKind) -> ProviderResult<Arc<dyn CalendarProvider>> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            ProviderError::configuration(format!("no adapter registered for {}", kind))
                .with_provider(kind)
        })
    }

    /// Returns the registered kinds in provider order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.kinds())
            .finish()
    }
}

/// A provider that always returns an error.
///
/// Registered in place of an adapter that failed to initialize, so the
/// failure shows up per account instead of aborting the whole pass.
#[derive(Debug)]
pub struct ErrorProvider {
    kind: ProviderKind,
    code: ProviderErrorCode,
    message: String,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(kind: ProviderKind, error: &ProviderError) -> Self {
        Self {
            kind,
            code: error.code(),
            message: error.message().to_string(),
        }
    }

    fn error(&self) -> ProviderError {
        ProviderError::new(self.code, self.message.clone()).with_provider(self.kind)
    }
}

impl CalendarProvider for ErrorProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn list_events<'a>(
        &'a self,
        _user_id: &'a str,
        _window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn create_event<'a>(
        &'a self,
        _user_id: &'a str,
        _event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn update_event<'a>(
        &'a self,
        _user_id: &'a str,
        _remote_id: &'a str,
        _event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }
}
