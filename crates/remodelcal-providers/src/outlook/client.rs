//! Microsoft Graph calendar client.

use chrono::SecondsFormat;
use tracing::{debug, trace};

use remodelcal_core::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, read_json};

use super::config::OutlookConfig;
use super::wire::{CalendarViewResponse, OutlookEvent};

/// Asks Graph to report every dateTime in UTC.
const PREFER_UTC: &str = "outlook.timezone=\"UTC\"";

/// Microsoft Graph calendar client.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http_client: reqwest::Client,
    config: OutlookConfig,
}

impl GraphClient {
    pub fn new(config: OutlookConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;
        Ok(Self {
            http_client: build_client(config.timeout)?,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Lists events in the window through `calendarView`.
    ///
    /// Follows `@odata.nextLink` until the last page.
    pub async fn calendar_view(
        &self,
        access_token: &str,
        window: TimeWindow,
    ) -> ProviderResult<Vec<OutlookEvent>> {
        let mut events = Vec::new();

        let first = self
            .http_client
            .get(self.url("/me/calendarView"))
            .query(&[
                (
                    "startDateTime",
                    window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                (
                    "endDateTime",
                    window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                ("$top", self.config.page_size.to_string()),
            ]);
        let mut request = Some(first);

        while let Some(builder) = request.take() {
            let response = builder
                .bearer_auth(access_token)
                .header("Prefer", PREFER_UTC)
                .send()
                .await
                .map_err(ProviderError::from_transport)?;
            let page: CalendarViewResponse = read_json(response).await?;
            trace!(count = page.value.len(), "received calendarView page");
            events.extend(page.value);

            // nextLink is absolute and carries every query parameter
            request = page.next_link.map(|link| self.http_client.get(link));
        }

        debug!("fetched {} events from calendarView", events.len());
        Ok(events)
    }

    /// Creates an event in the default calendar.
    pub async fn create_event(
        &self,
        access_token: &str,
        event: &OutlookEvent,
    ) -> ProviderResult<OutlookEvent> {
        let response = self
            .http_client
            .post(self.url("/me/events"))
            .bearer_auth(access_token)
            .header("Prefer", PREFER_UTC)
            .json(event)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        read_json(response).await
    }

    /// Patches an existing event.
    pub async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &OutlookEvent,
    ) -> ProviderResult<OutlookEvent> {
        let path = format!("/me/events/{}", urlencoding::encode(event_id));
        let response = self
            .http_client
            .patch(self.url(&path))
            .bearer_auth(access_token)
            .header("Prefer", PREFER_UTC)
            .json(event)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        read_json(response).await
    }
}
