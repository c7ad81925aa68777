//! Response handling shared by the HTTP adapters.

use std::time::Duration;

use reqwest::Response;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use crate::error::{ProviderError, ProviderResult};

/// Builds an HTTP client with the adapter's timeout.
pub(crate) fn build_client(timeout: Duration) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("remodelcal/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::configuration(format!("failed to create HTTP client: {}", e)))
}

/// Returns headers and body of a 2xx response, or the mapped error.
pub(crate) async fn read_success(response: Response) -> ProviderResult<(HeaderMap, String)> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;
    trace!(status = %status, bytes = body.len(), "received response");

    if !status.is_success() {
        if status.as_u16() == 429 {
            let retry_after = headers
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            warn!(retry_after, "rate limited by provider");
        }
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }
    Ok((headers, body))
}

/// Parses the JSON body of a 2xx response.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let (_, body) = read_success(response).await?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::invalid_response(format!("failed to parse response: {}", e)))
}
