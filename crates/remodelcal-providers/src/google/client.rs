//! Google Calendar API client.
//!
//! Low-level HTTP calls against Calendar API v3. The access token is passed
//! per call because one client serves every connected user.

use tracing::debug;

use remodelcal_core::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, read_json};

use super::config::GoogleConfig;
use super::wire::{EventListResponse, GoogleEvent};

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleCalendarClient {
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;
        Ok(Self {
            http_client: build_client(config.timeout)?,
            config,
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.config.calendar_id)
        )
    }

    /// Lists events in the window, following `nextPageToken`.
    ///
    /// Recurring events are expanded into single instances.
    pub async fn list_events(
        &self,
        access_token: &str,
        window: TimeWindow,
    ) -> ProviderResult<Vec<GoogleEvent>> {
        let url = self.events_url();
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(&url)
                .bearer_auth(access_token)
                .query(&[
                    ("timeMin", window.start.to_rfc3339()),
                    ("timeMax", window.end.to_rfc3339()),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                    ("maxResults", self.config.page_size.to_string()),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await.map_err(ProviderError::from_transport)?;
            let page: EventListResponse = read_json(response).await?;
            events.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            "fetched {} events from calendar {}",
            events.len(),
            self.config.calendar_id
        );
        Ok(events)
    }

    /// Creates an event and returns the stored resource.
    pub async fn insert_event(
        &self,
        access_token: &str,
        event: &GoogleEvent,
    ) -> ProviderResult<GoogleEvent> {
        let response = self
            .http_client
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        read_json(response).await
    }

    /// Replaces an event and returns the stored resource.
    pub async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &GoogleEvent,
    ) -> ProviderResult<GoogleEvent> {
        let url = format!("{}/{}", self.events_url(), urlencoding::encode(event_id));
        let response = self
            .http_client
            .put(url)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        read_json(response).await
    }
}
