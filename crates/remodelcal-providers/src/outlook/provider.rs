//! Outlook calendar provider implementation.

use std::sync::Arc;

use tracing::{debug, info};

use remodelcal_core::{LocalEvent, ProviderKind, TimeWindow};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarProvider};
use crate::remote_event::RemoteEvent;
use crate::tokens::TokenManager;
use crate::wire::WireEvent;

use super::client::GraphClient;
use super::config::OutlookConfig;
use super::wire::OutlookEvent;

/// Outlook provider backed by Microsoft Graph.
#[derive(Debug)]
pub struct OutlookProvider {
    client: GraphClient,
    tokens: Arc<TokenManager>,
}

impl OutlookProvider {
    pub fn new(config: OutlookConfig, tokens: Arc<TokenManager>) -> ProviderResult<Self> {
        Ok(Self {
            client: GraphClient::new(config)?,
            tokens,
        })
    }

    async fn list_impl(&self, user_id: &str, window: TimeWindow) -> ProviderResult<Vec<RemoteEvent>> {
        let token = self.tokens.access_token(user_id, ProviderKind::Outlook).await?;
        let events = self.client.calendar_view(&token, window).await?;
        let total = events.len();
        let remote: Vec<RemoteEvent> = events
            .into_iter()
            .filter_map(|e| WireEvent::Outlook(e).into_remote())
            .collect();
        debug!(user_id, total, kept = remote.len(), "listed outlook events");
        Ok(remote)
    }

    async fn create_impl(&self, user_id: &str, event: &LocalEvent) -> ProviderResult<RemoteEvent> {
        let token = self.tokens.access_token(user_id, ProviderKind::Outlook).await?;
        let created = self
            .client
            .create_event(&token, &payload(event)?)
            .await?;
        let remote = into_stored(created)?;
        info!(user_id, remote_id = %remote.id, "created outlook event");
        Ok(remote)
    }

    async fn update_impl(
        &self,
        user_id: &str,
        remote_id: &str,
        event: &LocalEvent,
    ) -> ProviderResult<RemoteEvent> {
        let token = self.tokens.access_token(user_id, ProviderKind::Outlook).await?;
        let updated = self
            .client
            .update_event(&token, remote_id, &payload(event)?)
            .await?;
        into_stored(updated)
    }
}

fn payload(event: &LocalEvent) -> ProviderResult<OutlookEvent> {
    match WireEvent::from_local(ProviderKind::Outlook, event, None) {
        WireEvent::Outlook(body) => Ok(body),
        _ => Err(ProviderError::internal("expected an Outlook payload")),
    }
}

fn into_stored(event: OutlookEvent) -> ProviderResult<RemoteEvent> {
    WireEvent::Outlook(event)
        .into_remote()
        .ok_or_else(|| ProviderError::invalid_response("graph returned an unusable event"))
}

impl CalendarProvider for OutlookProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Outlook
    }

    fn list_events<'a>(
        &'a self,
        user_id: &'a str,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move {
            self.list_impl(user_id, window)
                .await
                .map_err(|e| e.with_provider(ProviderKind::Outlook))
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
                .map_err(|e| e.with_provider(ProviderKind::Outlook))
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
                .map_err(|e| e.with_provider(ProviderKind::Outlook))
        })
    }
}
