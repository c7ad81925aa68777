//! Access-token management.
//!
//! Accounts are persisted by a [`CredentialStore`]; expired OAuth tokens are
//! renewed through a [`TokenRefresher`] and written back before use.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use remodelcal_core::{CalendarAccount, ProviderKind};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

/// Persistence for connected accounts.
pub trait CredentialStore: Send + Sync {
    /// Loads the account for `(user_id, provider)`, if connected.
    fn load_account<'a>(
        &'a self,
        user_id: &'a str,
        provider: ProviderKind,
    ) -> BoxFuture<'a, ProviderResult<Option<CalendarAccount>>>;

    /// Saves an account, replacing the previous row.
    fn save_account<'a>(&'a self, account: &'a CalendarAccount)
    -> BoxFuture<'a, ProviderResult<()>>;
}

/// The result of a successful token refresh.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Set when the provider rotates the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the new access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Exchanges a refresh token for a new access token.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        provider: ProviderKind,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<RefreshedToken>>;
}

/// Hands out valid access tokens, refreshing them when expired.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    /// Serializes refreshes so concurrent callers do not burn a
    /// single-use refresh token twice.
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns a valid access token for the user's account.
    pub async fn access_token(&self, user_id: &str, provider: ProviderKind) -> ProviderResult<String> {
        Ok(self.account(user_id, provider).await?.access_token)
    }

    /// Returns the user's account with a valid access token.
    ///
    /// # Errors
    ///
    /// Fails with an authentication error when the account is missing, or
    /// when the token is expired and cannot be refreshed.
    pub async fn account(
        &self,
        user_id: &str,
        provider: ProviderKind,
    ) -> ProviderResult<CalendarAccount> {
        let account = self.load(user_id, provider).await?;
        if !account.is_expired(Utc::now()) {
            return Ok(account);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        let mut account = self.load(user_id, provider).await?;
        if !account.is_expired(Utc::now()) {
            return Ok(account);
        }

        let refresh_token = account.refresh_token.clone().ok_or_else(|| {
            ProviderError::authentication(format!(
                "{} token expired and no refresh token is stored; reconnect the account",
                provider
            ))
            .with_provider(provider)
        })?;

        debug!(user_id, %provider, "refreshing expired access token");

        let refreshed = self
            .refresher
            .refresh(provider, &refresh_token)
            .await
            .map_err(|e| {
                warn!(user_id, %provider, error = %e, "token refresh failed");
                ProviderError::authentication(format!("token refresh failed: {}", e.message()))
                    .with_provider(provider)
                    .with_source(e)
            })?;

        account.update_access_token(
            refreshed.access_token,
            refreshed.refresh_token,
            refreshed.expires_in,
            Utc::now(),
        );
        self.store.save_account(&account).await?;

        info!(user_id, %provider, "access token refreshed");
        Ok(account)
    }

    async fn load(&self, user_id: &str, provider: ProviderKind) -> ProviderResult<CalendarAccount> {
        self.store
            .load_account(user_id, provider)
            .await?
            .ok_or_else(|| {
                ProviderError::authentication(format!("no {} account connected", provider))
                    .with_provider(provider)
            })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MemoryCredentials, StaticRefresher};
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::Duration;

    fn account() -> CalendarAccount {
        CalendarAccount::new("user-1", ProviderKind::Google, "pro@example.com", "old-token")
    }

    #[tokio::test]
    async fn valid_token_is_returned_without_refresh() {
        let store = MemoryCredentials::with_account(
            account().with_expires_at(Utc::now() + Duration::hours(1)),
        );
        let refresher = StaticRefresher::returning("new-token");
        let manager = TokenManager::new(store, refresher.clone());

        let token = manager.access_token("user-1", ProviderKind::Google).await.unwrap();
        assert_eq!(token, "old-token");
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let store = MemoryCredentials::with_account(
            account()
                .with_refresh_token("refresh-1")
                .with_expires_at(Utc::now() - Duration::minutes(5)),
        );
        let refresher = StaticRefresher::returning("new-token");
        let manager = TokenManager::new(store.clone(), refresher.clone());

        let token = manager.access_token("user-1", ProviderKind::Google).await.unwrap();
        assert_eq!(token, "new-token");
        assert_eq!(refresher.calls(), 1);

        let saved = store.get("user-1", ProviderKind::Google).unwrap();
        assert_eq!(saved.access_token, "new-token");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
        assert!(!saved.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn token_inside_skew_is_refreshed() {
        let store = MemoryCredentials::with_account(
            account()
                .with_refresh_token("refresh-1")
                .with_expires_at(Utc::now() + Duration::seconds(30)),
        );
        let refresher = StaticRefresher::returning("new-token");
        let manager = TokenManager::new(store, refresher.clone());

        manager.access_token("user-1", ProviderKind::Google).await.unwrap();
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_is_auth_error() {
        let store = MemoryCredentials::with_account(
            account().with_expires_at(Utc::now() - Duration::minutes(5)),
        );
        let manager = TokenManager::new(store, StaticRefresher::returning("unused"));

        let err = manager
            .access_token("user-1", ProviderKind::Google)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
    }

    #[tokio::test]
    async fn failed_refresh_is_auth_error() {
        let store = MemoryCredentials::with_account(
            account()
                .with_refresh_token("revoked")
                .with_expires_at(Utc::now() - Duration::minutes(5)),
        );
        let manager = TokenManager::new(store, StaticRefresher::failing());

        let err = manager
            .access_token("user-1", ProviderKind::Google)
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.provider(), Some(ProviderKind::Google));
    }

    #[tokio::test]
    async fn missing_account_is_auth_error() {
        let manager = TokenManager::new(
            Arc::new(MemoryCredentials::default()),
            StaticRefresher::returning("unused"),
        );
        let err = manager
            .access_token("user-1", ProviderKind::Outlook)
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }
}
