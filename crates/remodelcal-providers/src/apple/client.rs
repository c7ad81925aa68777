//! HTTP client for CalDAV operations.

use std::time::Duration;

use base64::Engine;
use reqwest::Method;
use tracing::trace;
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, read_success};

/// Basic credentials for one CalDAV account.
#[derive(Clone)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl Credentials<'_> {
    fn header(&self) -> String {
        basic_auth(self.username, self.password)
    }
}

/// Conditional header sent with a PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition<'a> {
    /// `If-None-Match: *`; never overwrites an existing resource.
    Create,
    /// `If-Match` with the ETag seen when the event was listed.
    Match(&'a str),
    /// No condition, for resources this process has not listed.
    Overwrite,
}

/// HTTP client for CalDAV REPORT and PUT requests.
#[derive(Debug, Clone)]
pub struct CalDavClient {
    http_client: reqwest::Client,
}

impl CalDavClient {
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            http_client: build_client(timeout)?,
        })
    }

    /// Performs a Depth 1 REPORT and returns the multistatus body.
    pub async fn report(
        &self,
        url: &Url,
        credentials: &Credentials<'_>,
        body: String,
    ) -> ProviderResult<String> {
        let method = Method::from_bytes(b"REPORT")
            .map_err(|_| ProviderError::internal("invalid HTTP method: REPORT"))?;

        trace!(url = %url, "sending REPORT");
        let response = self
            .http_client
            .request(method, url.clone())
            .header("Authorization", credentials.header())
            .header("Depth", "1")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let (_, text) = read_success(response).await?;
        Ok(text)
    }

    /// Writes a calendar object resource and returns its new ETag.
    pub async fn put(
        &self,
        url: &Url,
        credentials: &Credentials<'_>,
        ics: String,
        precondition: Precondition<'_>,
    ) -> ProviderResult<Option<String>> {
        trace!(url = %url, ?precondition, "sending PUT");
        let mut request = self
            .http_client
            .put(url.clone())
            .header("Authorization", credentials.header())
            .header("Content-Type", "text/calendar; charset=utf-8")
            .body(ics);
        match precondition {
            Precondition::Create => request = request.header("If-None-Match", "*"),
            Precondition::Match(etag) => {
                request = request.header("If-Match", format!("\"{}\"", etag))
            }
            Precondition::Overwrite => {}
        }

        let response = request.send().await.map_err(ProviderError::from_transport)?;
        let (headers, _) = read_success(response).await?;
        Ok(headers
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|etag| etag.trim_matches('"').to_string()))
    }
}

/// Builds an HTTP Basic `Authorization` header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encoding() {
        // base64("user:password") = "dXNlcjpwYXNzd29yZA=="
        assert_eq!(basic_auth("user", "password"), "Basic dXNlcjpwYXNzd29yZA==");
    }
}
