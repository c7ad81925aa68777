//! Apple calendar provider implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use remodelcal_core::{CalendarAccount, LocalEvent, ProviderKind, TimeWindow};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarProvider};
use crate::remote_event::RemoteEvent;
use crate::tokens::TokenManager;
use crate::wire::WireEvent;

use super::client::{CalDavClient, Credentials, Precondition};
use super::config::AppleConfig;
use super::ics::AppleEvent;
use super::xml::{calendar_query_body, parse_report_response};

/// Where a listed event lives on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resource {
    href: String,
    etag: Option<String>,
}

/// iCloud CalDAV provider.
#[derive(Debug)]
pub struct AppleProvider {
    client: CalDavClient,
    config: AppleConfig,
    tokens: Arc<TokenManager>,
    /// Keyed by (user_id, uid). Resource names written by other clients
    /// need not match the UID.
    resources: Mutex<HashMap<(String, String), Resource>>,
}

impl AppleProvider {
    pub fn new(config: AppleConfig, tokens: Arc<TokenManager>) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;
        Ok(Self {
            client: CalDavClient::new(config.timeout)?,
            config,
            tokens,
            resources: Mutex::new(HashMap::new()),
        })
    }

    async fn account(&self, user_id: &str) -> ProviderResult<(CalendarAccount, Url)> {
        let account = self.tokens.account(user_id, ProviderKind::Apple).await?;
        let collection = self.config.collection_url(&account.account_id).map_err(|e| {
            ProviderError::configuration(format!("invalid apple calendar_url: {}", e))
        })?;
        Ok((account, collection))
    }

    fn resource_url(collection: &Url, uid: &str) -> ProviderResult<Url> {
        let name = format!("{}.ics", uid);
        collection
            .join(&urlencoding::encode(&name))
            .map_err(|e| ProviderError::internal(format!("invalid resource name {}: {}", name, e)))
    }

    fn href_url(collection: &Url, href: &str) -> ProviderResult<Url> {
        collection
            .join(href)
            .map_err(|e| ProviderError::invalid_response(format!("invalid href {}: {}", href, e)))
    }

    async fn remember(&self, user_id: &str, uid: &str, resource: Resource) {
        self.resources
            .lock()
            .await
            .insert((user_id.to_string(), uid.to_string()), resource);
    }

    async fn list_impl(&self, user_id: &str, window: TimeWindow) -> ProviderResult<Vec<RemoteEvent>> {
        let (account, collection) = self.account(user_id).await?;
        let credentials = Credentials {
            username: &account.account_id,
            password: &account.access_token,
        };

        debug!(calendar = %collection, start = %window.start, end = %window.end, "fetching events with REPORT");
        let body = calendar_query_body(window.start, window.end)?;
        let response = self.client.report(&collection, &credentials, body).await?;

        let mut seen = HashSet::new();
        let mut listed = Vec::new();
        let mut events = Vec::new();
        for entry in parse_report_response(&response)? {
            for event in AppleEvent::parse_calendar(&entry.calendar_data) {
                let event = event.with_resource(Some(entry.href.clone()), entry.etag.clone());
                // Overridden instances of a recurring event share the master's
                // UID. The query does not ask for expansion, so a series shows
                // up once, at its master DTSTART.
                if !seen.insert(event.uid.clone()) {
                    continue;
                }
                listed.push((
                    event.uid.clone(),
                    Resource {
                        href: entry.href.clone(),
                        etag: entry.etag.clone(),
                    },
                ));
                if let Some(remote) = WireEvent::Apple(event).into_remote() {
                    events.push(remote);
                }
            }
        }

        let mut resources = self.resources.lock().await;
        for (uid, resource) in listed {
            resources.insert((user_id.to_string(), uid), resource);
        }
        drop(resources);

        debug!(user_id, count = events.len(), "listed apple events");
        Ok(events)
    }

    async fn put_impl(
        &self,
        user_id: &str,
        remote_id: Option<&str>,
        event: &LocalEvent,
    ) -> ProviderResult<RemoteEvent> {
        let (account, collection) = self.account(user_id).await?;
        let credentials = Credentials {
            username: &account.account_id,
            password: &account.access_token,
        };

        let WireEvent::Apple(payload) = WireEvent::from_local(ProviderKind::Apple, event, remote_id)
        else {
            return Err(ProviderError::internal("expected an Apple payload"));
        };
        let known = match remote_id {
            Some(uid) => self
                .resources
                .lock()
                .await
                .get(&(user_id.to_string(), uid.to_string()))
                .cloned(),
            None => None,
        };
        let url = match &known {
            Some(resource) => Self::href_url(&collection, &resource.href)?,
            None => Self::resource_url(&collection, &payload.uid)?,
        };
        let precondition = match (remote_id, known.as_ref().and_then(|r| r.etag.as_deref())) {
            (None, _) => Precondition::Create,
            (Some(_), Some(etag)) => Precondition::Match(etag),
            (Some(_), None) => Precondition::Overwrite,
        };
        let create = remote_id.is_none();

        let etag = self
            .client
            .put(&url, &credentials, payload.to_ics(), precondition)
            .await?;

        let resource = Resource {
            href: url.path().to_string(),
            etag: etag.clone(),
        };
        self.remember(user_id, &payload.uid, resource).await;

        let stored = payload.with_resource(Some(url.path().to_string()), etag);
        let remote = WireEvent::Apple(stored)
            .into_remote()
            .ok_or_else(|| ProviderError::internal("stored event is cancelled"))?;
        if create {
            info!(user_id, remote_id = %remote.id, "created apple event");
        }
        Ok(remote)
    }
}

impl CalendarProvider for AppleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    fn list_events<'a>(
        &'a self,
        user_id: &'a str,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(async move {
            self.list_impl(user_id, window)
                .await
                .map_err(|e| e.with_provider(ProviderKind::Apple))
        })
    }

    fn create_event<'a>(
        &'a self,
        user_id: &'a str,
        event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        Box::pin(async move {
            self.put_impl(user_id, None, event)
                .await
                .map_err(|e| e.with_provider(ProviderKind::Apple))
        })
    }

    fn update_event<'a>(
        &'a self,
        user_id: &'a str,
        remote_id: &'a str,
        event: &'a LocalEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        Box::pin(async move {
            self.put_impl(user_id, Some(remote_id), event)
                .await
                .map_err(|e| e.with_provider(ProviderKind::Apple))
        })
    }
}
