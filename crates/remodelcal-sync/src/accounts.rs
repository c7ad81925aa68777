//! Connecting, configuring and disconnecting calendar accounts.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use remodelcal_core::{CalendarAccount, ProviderKind};
use remodelcal_providers::FunctionsClient;

use crate::error::{StoreError, SyncError, SyncResult};
use crate::store::SyncStore;

/// Account lifecycle operations for one store.
pub struct AccountService {
    store: Arc<dyn SyncStore>,
    functions: Option<FunctionsClient>,
}

impl AccountService {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self {
            store,
            functions: None,
        }
    }

    /// Enables OAuth connections through the hosted auth functions.
    pub fn with_functions(mut self, client: FunctionsClient) -> Self {
        self.functions = Some(client);
        self
    }

    /// Completes an OAuth callback: exchanges `code` and stores the account.
    ///
    /// Reconnecting keeps the account's sync, primary and color settings, and
    /// keeps the stored refresh token when the provider does not send a new
    /// one.
    pub async fn connect(
        &self,
        user_id: &str,
        provider: ProviderKind,
        code: &str,
        redirect_uri: &str,
    ) -> SyncResult<CalendarAccount> {
        if !provider.uses_oauth() {
            return Err(SyncError::config(format!(
                "{} accounts connect with an app-specific password",
                provider
            )));
        }
        let functions = self
            .functions
            .as_ref()
            .ok_or_else(|| SyncError::config("serverless functions are not configured"))?;

        let grant = functions.exchange_code(provider, code, redirect_uri).await?;
        let previous = self.store.account(user_id, provider).await?;

        let mut account =
            CalendarAccount::new(user_id, provider, &grant.account_id, &grant.access_token)
                .with_scopes(grant.scope_list());
        if let Some(secs) = grant.expires_in {
            account = account.with_expires_in(secs, Utc::now());
        }
        account.refresh_token = grant
            .refresh_token
            .or_else(|| previous.as_ref().and_then(|p| p.refresh_token.clone()));

        let account = self.save_new(account, previous).await?;
        info!(user_id, %provider, account_id = %account.account_id, "calendar connected");
        Ok(account)
    }

    /// Stores an iCloud account authenticated with an app-specific password.
    pub async fn connect_apple(
        &self,
        user_id: &str,
        apple_id: &str,
        app_password: &str,
    ) -> SyncResult<CalendarAccount> {
        if apple_id.trim().is_empty() || app_password.trim().is_empty() {
            return Err(SyncError::config(
                "apple id and app-specific password are required",
            ));
        }
        let previous = self.store.account(user_id, ProviderKind::Apple).await?;
        let account = CalendarAccount::new(
            user_id,
            ProviderKind::Apple,
            apple_id.trim(),
            app_password.trim(),
        );
        let account = self.save_new(account, previous).await?;
        info!(user_id, provider = "apple", account_id = %account.account_id, "calendar connected");
        Ok(account)
    }

    async fn save_new(
        &self,
        mut account: CalendarAccount,
        previous: Option<CalendarAccount>,
    ) -> SyncResult<CalendarAccount> {
        match previous {
            Some(prev) => {
                account.is_primary = prev.is_primary;
                account.sync_enabled = prev.sync_enabled;
                account.color = prev.color;
            }
            None => {
                let others = self.store.accounts(&account.user_id).await?;
                account.is_primary = !others.iter().any(|a| a.is_primary);
            }
        }
        self.store.upsert_account(&account).await?;
        Ok(account)
    }

    /// Deletes an account. A removed primary hands over to the remaining
    /// account first in provider order.
    pub async fn disconnect(
        &self,
        user_id: &str,
        provider: ProviderKind,
    ) -> SyncResult<CalendarAccount> {
        let removed = self.store.delete_account(user_id, provider).await?;
        info!(user_id, %provider, "calendar disconnected");

        if removed.is_primary {
            if let Some(mut next) = self.store.accounts(user_id).await?.into_iter().next() {
                next.is_primary = true;
                self.store.upsert_account(&next).await?;
                info!(user_id, provider = %next.provider, "primary calendar reassigned");
            }
        }
        Ok(removed)
    }

    pub async fn set_sync_enabled(
        &self,
        user_id: &str,
        provider: ProviderKind,
        enabled: bool,
    ) -> SyncResult<CalendarAccount> {
        let mut account = self.require(user_id, provider).await?;
        account.sync_enabled = enabled;
        self.store.upsert_account(&account).await?;
        info!(user_id, %provider, enabled, "sync setting changed");
        Ok(account)
    }

    /// Makes `provider` the user's only primary account.
    pub async fn set_primary(&self, user_id: &str, provider: ProviderKind) -> SyncResult<CalendarAccount> {
        let target = self.require(user_id, provider).await?;
        for mut account in self.store.accounts(user_id).await? {
            let is_primary = account.provider == provider;
            if account.is_primary != is_primary {
                account.is_primary = is_primary;
                self.store.upsert_account(&account).await?;
            }
        }
        info!(user_id, %provider, "primary calendar set");
        Ok(CalendarAccount {
            is_primary: true,
            ..target
        })
    }

    pub async fn list(&self, user_id: &str) -> SyncResult<Vec<CalendarAccount>> {
        Ok(self.store.accounts(user_id).await?)
    }

    async fn require(&self, user_id: &str, provider: ProviderKind) -> SyncResult<CalendarAccount> {
        self.store
            .account(user_id, provider)
            .await?
            .ok_or_else(|| StoreError::not_found("account", format!("{}/{}", user_id, provider)).into())
    }
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("functions", &self.functions.is_some())
            .finish_non_exhaustive()
    }
}
