//! Connected calendar accounts and their OAuth credentials.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

/// Access tokens are treated as expired this many seconds before the
/// provider-reported expiry.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// A calendar provider connection owned by a user.
///
/// One row per `(user_id, provider)`. Created on OAuth callback, updated on
/// token refresh, deleted on disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAccount {
    /// Owner of the connection.
    pub user_id: String,
    /// The provider this account belongs to.
    pub provider: ProviderKind,
    /// Provider-side account identifier (e-mail or Apple ID).
    pub account_id: String,
    /// Access token for API requests (app-specific password for Apple).
    pub access_token: String,
    /// Refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires, if it does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether sync passes include this account.
    #[serde(default = "default_true")]
    pub sync_enabled: bool,
    /// Whether local bookings are pushed to this account.
    #[serde(default)]
    pub is_primary: bool,
    /// Display color override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Last time the row was written.
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl CalendarAccount {
    /// Creates a sync-enabled, non-primary account.
    pub fn new(
        user_id: impl Into<String>,
        provider: ProviderKind,
        account_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            provider,
            account_id: account_id.into(),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            sync_enabled: true,
            is_primary: false,
            color: None,
            scopes: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Builder method to set the refresh token.
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Builder method to set the expiry from an `expires_in` value.
    pub fn with_expires_in(mut self, expires_in_secs: i64, now: DateTime<Utc>) -> Self {
        self.expires_at = Some(now + Duration::seconds(expires_in_secs));
        self
    }

    /// Builder method to set an absolute expiry.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Builder method to mark the account as primary.
    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    /// Builder method to enable or disable sync.
    pub fn with_sync_enabled(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    /// Builder method to set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Builder method to set granted scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at - Duration::seconds(EXPIRY_SKEW_SECS),
            // Tokens without an expiry (Apple app passwords) never expire
            None => false,
        }
    }

    /// Returns true if a refresh token is available.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Returns true if the account holds a usable or refreshable token.
    pub fn is_connected(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) || self.can_refresh()
    }

    /// Returns the configured color or the provider default.
    pub fn display_color(&self) -> &str {
        self.color
            .as_deref()
            .unwrap_or_else(|| self.provider.default_color())
    }

    /// Updates the access token after a refresh.
    ///
    /// A rotated refresh token replaces the stored one; `None` keeps it.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        now: DateTime<Utc>,
    ) {
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expires_in_secs.map(|secs| now + Duration::seconds(secs));
        self.updated_at = now;
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at - now)
    }
}
