//! Wiring from configuration to the sync services.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, warn};

use remodelcal_core::{ConflictPolicy, ProviderKind};
use remodelcal_providers::apple::AppleProvider;
use remodelcal_providers::google::GoogleProvider;
use remodelcal_providers::outlook::OutlookProvider;
use remodelcal_providers::{
    BoxFuture, CalendarProvider, ErrorProvider, FunctionTokenRefresher, FunctionsClient,
    ProviderError, ProviderRegistry, ProviderResult, RefreshedToken, TokenManager, TokenRefresher,
};
use remodelcal_sync::{
    AccountService, AvailabilityConfig, CalendarAggregator, LocalStore, StoreCredentials,
    SyncConfig, SyncEngine, SyncStore,
};

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Services built from one configuration.
pub struct Context {
    store: Arc<dyn SyncStore>,
    providers: Arc<ProviderRegistry>,
    functions: Option<FunctionsClient>,
    sync: SyncConfig,
    availability: AvailabilityConfig,
}

impl Context {
    /// Opens the store and builds the adapters.
    ///
    /// An adapter that cannot be built is replaced by an [`ErrorProvider`],
    /// so only that provider's accounts fail.
    pub fn open(config: &AppConfig) -> CliResult<Self> {
        let sync = config.sync.to_sync_config();
        sync.validate().map_err(CliError::config)?;
        let availability = config
            .availability
            .to_availability_config()
            .map_err(CliError::config)?;

        let path = config.store.resolved_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening store");
        let store: Arc<dyn SyncStore> = Arc::new(LocalStore::open(path.clone())?);

        let functions = match config.functions {
            Some(ref settings) => {
                let client_config = settings.to_client_config().map_err(CliError::config)?;
                Some(FunctionsClient::new(client_config)?)
            }
            None => None,
        };

        let refresher: Arc<dyn TokenRefresher> = match functions {
            Some(ref client) => Arc::new(FunctionTokenRefresher::new(client.clone())),
            None => Arc::new(UnconfiguredRefresher),
        };
        let tokens = Arc::new(TokenManager::new(
            Arc::new(StoreCredentials::new(Arc::clone(&store))),
            refresher,
        ));

        let mut providers = ProviderRegistry::new();
        providers.register(adapter(
            ProviderKind::Google,
            GoogleProvider::new(config.google.to_provider_config(), Arc::clone(&tokens))
                .map(|p| Arc::new(p) as Arc<dyn CalendarProvider>),
        ));
        providers.register(adapter(
            ProviderKind::Outlook,
            OutlookProvider::new(config.outlook.to_provider_config(), Arc::clone(&tokens))
                .map(|p| Arc::new(p) as Arc<dyn CalendarProvider>),
        ));
        let apple = match config.apple {
            Some(ref settings) => {
                AppleProvider::new(settings.to_provider_config(), Arc::clone(&tokens))
                    .map(|p| Arc::new(p) as Arc<dyn CalendarProvider>)
            }
            None => Err(ProviderError::configuration("[apple] calendar_url is not configured")),
        };
        providers.register(adapter(ProviderKind::Apple, apple));

        Ok(Self {
            store,
            providers: Arc::new(providers),
            functions,
            sync,
            availability,
        })
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    pub fn time_zone(&self) -> Tz {
        self.availability.timezone
    }

    pub fn sync_config(&self) -> &SyncConfig {
        &self.sync
    }

    /// Builds a sync engine, optionally overriding the conflict policy.
    pub fn engine(&self, policy: Option<ConflictPolicy>) -> SyncEngine {
        let mut config = self.sync.clone();
        if let Some(policy) = policy {
            config = config.with_policy(policy);
        }
        SyncEngine::new(Arc::clone(&self.store), Arc::clone(&self.providers), config)
    }

    pub fn aggregator(&self) -> CalendarAggregator {
        CalendarAggregator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.providers),
            self.availability.clone(),
        )
    }

    pub fn accounts(&self) -> AccountService {
        let service = AccountService::new(Arc::clone(&self.store));
        match self.functions {
            Some(ref client) => service.with_functions(client.clone()),
            None => service,
        }
    }
}

fn adapter(
    kind: ProviderKind,
    built: ProviderResult<Arc<dyn CalendarProvider>>,
) -> Arc<dyn CalendarProvider> {
    match built {
        Ok(provider) => provider,
        Err(e) => {
            debug!(provider = %kind, error = %e, "adapter unavailable");
            Arc::new(ErrorProvider::new(kind, &e))
        }
    }
}

/// Refresher used when no functions endpoint is configured.
struct UnconfiguredRefresher;

impl TokenRefresher for UnconfiguredRefresher {
    fn refresh<'a>(
        &'a self,
        provider: ProviderKind,
        _refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<RefreshedToken>> {
        Box::pin(async move {
            warn!(%provider, "token expired but [functions] is not configured");
            Err(ProviderError::configuration(
                "cannot refresh tokens: [functions] is not configured",
            )
            .with_provider(provider))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use remodelcal_core::{CalendarAccount, TimeWindow};
    use remodelcal_sync::SyncError;

    fn config_in(dir: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.store.path = Some(dir.path().join("data").join("store.json"));
        config.sync.holder = Some("test:1".to_string());
        config
    }

    #[tokio::test]
    async fn unconfigured_apple_fails_only_its_account() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::open(&config_in(&dir)).unwrap();
        assert!(dir.path().join("data").is_dir());

        context
            .store()
            .upsert_account(&CalendarAccount::new("user-1", ProviderKind::Apple, "me@icloud.com", "pw"))
            .await
            .unwrap();

        let now = Utc::now();
        let events = context
            .aggregator()
            .get_all_events("user-1", TimeWindow::new(now, now + Duration::days(1)))
            .await
            .unwrap();
        assert!(events.events.is_empty());
        assert_eq!(events.failures.len(), 1);
        assert_eq!(events.failures[0].provider, ProviderKind::Apple);
        assert_eq!(events.failures[0].code, "configuration_error");

        let err = context.engine(None).perform_full_sync("user-1").await.unwrap_err();
        assert!(matches!(err, SyncError::Provider(_)));
    }

    #[tokio::test]
    async fn expired_token_without_functions_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::open(&config_in(&dir)).unwrap();
        let now = Utc::now();
        context
            .store()
            .upsert_account(
                &CalendarAccount::new("user-1", ProviderKind::Google, "pro@gmail.com", "old")
                    .with_refresh_token("1//0g")
                    .with_expires_at(now - Duration::hours(1)),
            )
            .await
            .unwrap();

        let events = context
            .aggregator()
            .get_all_events("user-1", TimeWindow::new(now, now + Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(events.failures.len(), 1);
        assert!(events.failures[0].message.contains("[functions] is not configured"));
    }

    #[test]
    fn policy_override_applies_to_engine_only() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::open(&config_in(&dir)).unwrap();
        let engine = context.engine(Some(ConflictPolicy::LocalWins));
        assert_eq!(engine.config().policy, ConflictPolicy::LocalWins);
        assert_eq!(context.sync_config().policy, ConflictPolicy::RemoteWins);
        assert_eq!(engine.config().holder, "test:1");
    }

    #[test]
    fn bad_availability_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.availability.timezone = "Nowhere/Special".to_string();
        assert!(matches!(Context::open(&config), Err(CliError::Config(_))));
    }
}
