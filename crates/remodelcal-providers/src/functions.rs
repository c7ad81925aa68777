//! Client for the hosted serverless functions.
//!
//! OAuth code exchange and token refresh run server-side so client secrets
//! never leave the backend. Each function answers with a `{data, error}`
//! envelope.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use remodelcal_core::ProviderKind;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;
use crate::tokens::{RefreshedToken, TokenRefresher};

/// Connection settings for the functions endpoint.
#[derive(Debug, Clone)]
pub struct FunctionsConfig {
    /// Base URL, e.g. `https://<project>.supabase.co/functions/v1`.
    pub base_url: Url,
    /// Project API key, sent as bearer token and `apikey` header.
    pub api_key: String,
    pub timeout: Duration,
}

impl FunctionsConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url.as_ref())?,
            api_key: api_key.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn function_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), name)
    }
}

/// Tokens granted by an OAuth code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Provider-side account identifier.
    #[serde(alias = "email")]
    pub account_id: String,
    /// Space-separated granted scopes.
    #[serde(default, alias = "scope")]
    pub scopes: Option<String>,
}

impl TokenGrant {
    /// Returns the granted scopes as a list.
    pub fn scope_list(&self) -> Vec<String> {
        self.scopes
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<Value>,
}

/// HTTP client for serverless function invocation.
#[derive(Debug, Clone)]
pub struct FunctionsClient {
    http_client: reqwest::Client,
    config: FunctionsConfig,
}

impl FunctionsClient {
    pub fn new(config: FunctionsConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    /// Invokes function `name` with a JSON body and unwraps the envelope.
    pub async fn invoke<T: DeserializeOwned>(&self, name: &str, body: &Value) -> ProviderResult<T> {
        let url = self.config.function_url(name);
        debug!(function = name, "invoking serverless function");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("apikey", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(ProviderError::from_transport)?;
        trace!(function = name, status = %status, "function responded");

        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &text));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ProviderError::invalid_response(format!("{} returned malformed JSON: {}", name, e))
        })?;

        if let Some(error) = envelope.error.filter(|e| !e.is_null()) {
            return Err(ProviderError::bad_request(format!(
                "{} failed: {}",
                name,
                error_message(&error)
            )));
        }

        envelope
            .data
            .ok_or_else(|| ProviderError::invalid_response(format!("{} returned no data", name)))
    }

    /// Exchanges an OAuth authorization code for tokens.
    pub async fn exchange_code(
        &self,
        provider: ProviderKind,
        code: &str,
        redirect_uri: &str,
    ) -> ProviderResult<TokenGrant> {
        let body = json!({
            "action": "exchange",
            "code": code,
            "redirect_uri": redirect_uri,
        });
        self.invoke(provider.auth_function(), &body)
            .await
            .map_err(|e| e.with_provider(provider))
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Refreshes tokens through the provider's auth function.
#[derive(Debug, Clone)]
pub struct FunctionTokenRefresher {
    client: FunctionsClient,
}

impl FunctionTokenRefresher {
    pub fn new(client: FunctionsClient) -> Self {
        Self { client }
    }
}

impl TokenRefresher for FunctionTokenRefresher {
    fn refresh<'a>(
        &'a self,
        provider: ProviderKind,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<RefreshedToken>> {
        Box::pin(async move {
            if !provider.uses_oauth() {
                return Err(ProviderError::configuration(format!(
                    "{} accounts do not use OAuth refresh",
                    provider
                ))
                .with_provider(provider));
            }
            let body = json!({
                "action": "refresh",
                "refresh_token": refresh_token,
            });
            self.client
                .invoke(provider.auth_function(), &body)
                .await
                .map_err(|e| e.with_provider(provider))
        })
    }
}
