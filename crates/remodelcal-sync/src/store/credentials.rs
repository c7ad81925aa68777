use std::sync::Arc;

use remodelcal_core::{CalendarAccount, ProviderKind};
use remodelcal_providers::{BoxFuture, CredentialStore, ProviderError, ProviderResult};

use crate::error::StoreError;

use super::SyncStore;

/// Serves a [`SyncStore`]'s account table to the token manager.
#[derive(Clone)]
pub struct StoreCredentials {
    store: Arc<dyn SyncStore>,
}

impl StoreCredentials {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }
}

fn to_provider_error(err: StoreError) -> ProviderError {
    ProviderError::internal(format!("credential store: {}", err)).with_source(err)
}

impl CredentialStore for StoreCredentials {
    fn load_account<'a>(
        &'a self,
        user_id: &'a str,
        provider: ProviderKind,
    ) -> BoxFuture<'a, ProviderResult<Option<CalendarAccount>>> {
        Box::pin(async move {
            self.store
                .account(user_id, provider)
                .await
                .map_err(to_provider_error)
        })
    }

    fn save_account<'a>(
        &'a self,
        account: &'a CalendarAccount,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.store
                .upsert_account(account)
                .await
                .map_err(to_provider_error)
        })
    }
}
