//! Google Calendar provider implementation.

use std::sync::Arc;

use tracing::{debug, info};

use remodelcal_core::{LocalEvent, ProviderKind, TimeWindow};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarProvider};
use crate::remote_event::RemoteEvent;
use crate::tokens::TokenManager;
use crate::wire::WireEvent;

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::wire::GoogleEvent;

/// Google Calendar provider.
#[derive(Debug)]
pub struct GoogleProvider {
    client: GoogleCalendarClient,
    tokens: Arc<TokenManager>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig, tokens: Arc<TokenManager>) -> ProviderResult<Self> {
        Ok(Self {
            client: GoogleCalendarClient::new(config)?,
            tokens,
        })
    }

    async fn token(&self, user_id: &str) -> ProviderResult<String> {
        self.tokens.access_token(user_id, ProviderKind::Google).await
    }

    async fn list_impl(&self, user_id: &str, window: TimeWindow) -> ProviderResult<Vec<RemoteEvent>> {
        let token = self.token(user_id).await?;
        let events = self.client.list_events(&token, window).await?;
        let total = events.len();
        let remote: Vec<RemoteEvent> = events
            .into_iter()
            .filter_map(|e| WireEvent::Google(e).into_remote())
            .collect();
        debug!(user_id, total, kept = remote.len(), "listed google events");
        Ok(remote)
    }

    async fn create_impl(&self, user_id: &str, event: &LocalEvent) -> ProviderResult<RemoteEvent> {
        let token = self.token(user_id).await?;
        let body = payload(event)?;
        let created = self.client.insert_event(&token, &body).await?;
        let remote = into_stored(created)?;
        info!(user_id, remote_id = %remote.id, "created google event");
        Ok(remote)
    }

    async fn update_impl(
        &self,
        user_id: &str,
        remote_id: &str,
        event: &LocalEvent,
    ) -> ProviderResult<RemoteEvent> {
        let token = self.token(user_id).await?;
        let body = payload(event)?;
        let updated = self.client.update_event(&token, remote_id, &body).await?;
        into_stored(updated)
    }
}

fn payload(event: &LocalEvent) -> ProviderResult<GoogleEvent> {
    match WireEvent::from_local(ProviderKind::Google, event, None) {
        WireEvent::Google(body) => Ok(body),
        _ => Err(ProviderError::internal("expected a Google payload")),
    }
}

fn into_stored(event: GoogleEvent) -> ProviderResult<RemoteEvent> {
    WireEvent::Google(event)
        .into_remote()
        .ok_or_else(|| ProviderError::invalid_response("google returned an unusable event"))
}

impl CalendarProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn list_events<'a>(
        &'a self,
        user_id: &'a str,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move {
            self.list_impl(user_id, window)
                .await
                .map_err(|e| e.with_provider(ProviderKind::Google))
        })
    }

    fn create_event<'a>(
        &'a self,
        user_id: &'a str,
        event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        Box::pin(async move {
            self.create_impl(user_id, event)
                .await
                .map_err(|e| e.with_provider(ProviderKind::Google))
        })
    }

    fn update_event<'a>(
        &'a self,
        user_id: &'a str,
        remote_id: &'a str,
        event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        Box::pin(async move {
            self.update_impl(user_id, remote_id, event)
                .await
                .map_err(|e| e.with_provider(ProviderKind::Google))
        })
    }
}
