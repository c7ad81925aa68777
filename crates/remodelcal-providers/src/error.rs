//! Provider errors.
//!
//! Every adapter and the functions client report failures as a
//! [`ProviderError`]: a [`ProviderErrorCode`] that the sync status stores as a
//! string, a message, the provider it came from and an optional cause.

use std::error::Error as StdError;
use std::fmt;

use remodelcal_core::ProviderKind;
use thiserror::Error;

type Cause = Box<dyn StdError + Send + Sync>;

/// What kind of failure a provider call hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// 401, or a token that is expired and cannot be refreshed.
    AuthenticationFailed,
    /// 403.
    AuthorizationFailed,
    NetworkError,
    /// 429.
    RateLimited,
    /// 5xx.
    ServerError,
    /// Unparseable payload or an unexpected status.
    InvalidResponse,
    NotFound,
    /// 400 or 422.
    BadRequest,
    /// Missing settings, unsupported operation or an adapter that never built.
    ConfigurationError,
    InternalError,
}

impl ProviderErrorCode {
    const NAMES: [(Self, &'static str); 10] = [
        (Self::AuthenticationFailed, "authentication_failed"),
        (Self::AuthorizationFailed, "authorization_failed"),
        (Self::NetworkError, "network_error"),
        (Self::RateLimited, "rate_limited"),
        (Self::ServerError, "server_error"),
        (Self::InvalidResponse, "invalid_response"),
        (Self::NotFound, "not_found"),
        (Self::BadRequest, "bad_request"),
        (Self::ConfigurationError, "configuration_error"),
        (Self::InternalError, "internal_error"),
    ];

    /// Returns the name recorded in `calendar_sync_status.failures`.
    pub fn as_str(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(code, _)| code == self)
            .map_or("internal_error", |(_, name)| *name)
    }

    /// Looks up a code by its recorded name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(code, _)| *code)
    }

    /// True for failures that may clear up on their own. Nothing retries
    /// automatically; the flag only shapes what the user is told.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    /// Classifies a non-2xx HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::AuthenticationFailed,
            403 => Self::AuthorizationFailed,
            404 | 410 => Self::NotFound,
            400 | 422 => Self::BadRequest,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::InvalidResponse,
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call to a calendar vendor or to the OAuth functions.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    provider: Option<ProviderKind>,
    #[source]
    source: Option<Cause>,
}

macro_rules! shorthand {
    ($($(#[$doc:meta])* $name:ident => $code:ident;)+) => {
        $(
            $(#[$doc])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ProviderErrorCode::$code, message)
            }
        )+
    };
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    shorthand! {
        authentication => AuthenticationFailed;
        network => NetworkError;
        rate_limited => RateLimited;
        /// The vendor answered with something we could not use.
        invalid_response => InvalidResponse;
        bad_request => BadRequest;
        configuration => ConfigurationError;
        internal => InternalError;
    }

    /// Builds the error for a non-2xx vendor response, keeping the body
    /// (trimmed) in the message.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = match body {
            "" => format!("HTTP {}", status),
            _ => format!("HTTP {}: {}", status, body),
        };
        Self::new(ProviderErrorCode::from_status(status), message)
    }

    /// Wraps a `reqwest` transport failure as a network error.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("could not connect: {}", err)
        } else {
            format!("request failed: {}", err)
        };
        Self::network(message).with_source(err)
    }

    /// Tags the error with the provider it came from.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<ProviderKind> {
        self.provider
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// True when the account has to be reconnected or refreshed.
    pub fn is_auth(&self) -> bool {
        self.code == ProviderErrorCode::AuthenticationFailed
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.provider {
            Some(provider) => write!(f, "{} {}: {}", provider, self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_names() {
        for (code, name) in ProviderErrorCode::NAMES {
            assert_eq!(code.as_str(), name);
            assert_eq!(ProviderErrorCode::from_name(name), Some(code));
        }
        assert_eq!(ProviderErrorCode::from_name("calendar_error"), None);
    }

    #[test]
    fn statuses_classify() {
        use ProviderErrorCode::*;
        let cases = [
            (401, AuthenticationFailed),
            (403, AuthorizationFailed),
            (404, NotFound),
            (410, NotFound),
            (422, BadRequest),
            (429, RateLimited),
            (503, ServerError),
            (302, InvalidResponse),
        ];
        for (status, code) in cases {
            assert_eq!(ProviderErrorCode::from_status(status), code, "status {}", status);
        }
        assert!(ServerError.is_retryable());
        assert!(!AuthenticationFailed.is_retryable());
    }

    #[test]
    fn status_error_keeps_trimmed_body() {
        let err = ProviderError::from_status(500, " backend exploded ");
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert_eq!(err.message(), "HTTP 500: backend exploded");
        assert!(err.is_retryable());

        let err = ProviderError::from_status(401, "");
        assert!(err.is_auth());
        assert_eq!(err.message(), "HTTP 401");
    }

    #[test]
    fn display_names_provider_and_code() {
        let err = ProviderError::rate_limited("slow down").with_provider(ProviderKind::Outlook);
        assert_eq!(err.to_string(), "outlook rate_limited: slow down");
        assert_eq!(err.provider(), Some(ProviderKind::Outlook));
        assert_eq!(
            ProviderError::configuration("no calendar_url").to_string(),
            "configuration_error: no calendar_url"
        );
    }

    #[test]
    fn source_is_exposed() {
        let err = ProviderError::internal("credential store")
            .with_source(std::io::Error::other("disk full"));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk full"));
    }
}
