//! CLI configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/remodelcal/config.toml` by default.
//!
//! Secret values (`functions.api_key`) support secret references:
//! - `pass::path/in/store` - resolved via `pass show`
//! - `env::VAR_NAME` - resolved from the environment
//! - plain text - used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use remodelcal_core::ConflictPolicy;
use remodelcal_providers::FunctionsConfig;
use remodelcal_providers::apple::AppleConfig;
use remodelcal_providers::google::GoogleConfig;
use remodelcal_providers::outlook::OutlookConfig;
use remodelcal_sync::{AvailabilityConfig, SyncConfig, default_holder};

/// Configuration for the remodelcal CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Local store settings.
    pub store: StoreSettings,

    /// Hosted OAuth functions. Required to connect or refresh OAuth accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<FunctionsSettings>,

    pub google: GoogleSettings,

    pub outlook: OutlookSettings,

    /// iCloud CalDAV settings. Apple accounts fail to sync without them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple: Option<AppleSettings>,

    pub sync: SyncSettings,

    pub availability: AvailabilitySettings,
}

/// Where the local tables are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the store file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreSettings {
    /// Returns the configured path or the default data file.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::default_data_dir().join("store.json"))
    }
}

/// Serverless functions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsSettings {
    /// Base URL, e.g. `https://<project>.supabase.co/functions/v1`.
    pub base_url: String,

    /// Project API key (supports `pass::` and `env::` prefixes).
    pub api_key: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl FunctionsSettings {
    /// Resolves the API key and builds the client configuration.
    pub fn to_client_config(&self) -> Result<FunctionsConfig, String> {
        let api_key = crate::secret::resolve(&self.api_key)
            .map_err(|e| format!("failed to resolve functions api_key: {}", e))?;
        if api_key.trim().is_empty() {
            return Err("functions api_key is empty".to_string());
        }
        let config = FunctionsConfig::new(&self.base_url, api_key)
            .map_err(|e| format!("invalid functions base_url {:?}: {}", self.base_url, e))?;
        Ok(config.with_timeout(Duration::from_secs(self.timeout_secs)))
    }
}

/// Google Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub api_base: String,
    pub calendar_id: String,
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            api_base: GoogleConfig::DEFAULT_API_BASE.to_string(),
            calendar_id: GoogleConfig::DEFAULT_CALENDAR_ID.to_string(),
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GoogleSettings {
    pub fn to_provider_config(&self) -> GoogleConfig {
        GoogleConfig::new()
            .with_api_base(&self.api_base)
            .with_calendar_id(&self.calendar_id)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Microsoft Graph settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlookSettings {
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for OutlookSettings {
    fn default() -> Self {
        Self {
            api_base: OutlookConfig::DEFAULT_API_BASE.to_string(),
            timeout_secs: OutlookConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl OutlookSettings {
    pub fn to_provider_config(&self) -> OutlookConfig {
        OutlookConfig::new()
            .with_api_base(&self.api_base)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// iCloud CalDAV settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppleSettings {
    /// Calendar collection URL; `{account_id}` is replaced by the Apple ID.
    pub calendar_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AppleSettings {
    pub fn to_provider_config(&self) -> AppleConfig {
        AppleConfig::new(&self.calendar_url).with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Sync pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// `remote_wins`, `local_wins`, `merge` or `manual_review`.
    pub policy: ConflictPolicy,
    pub lookbehind_days: i64,
    pub lookahead_days: i64,
    pub lock_ttl_secs: i64,
    /// Lock holder id; defaults to `hostname:pid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            policy: defaults.policy,
            lookbehind_days: defaults.lookbehind_days,
            lookahead_days: defaults.lookahead_days,
            lock_ttl_secs: defaults.lock_ttl.num_seconds(),
            holder: None,
        }
    }
}

impl SyncSettings {
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_policy(self.policy)
            .with_lookbehind_days(self.lookbehind_days)
            .with_lookahead_days(self.lookahead_days)
            .with_lock_ttl(
                chrono::Duration::try_seconds(self.lock_ttl_secs).unwrap_or(chrono::Duration::MAX),
            )
            .with_holder(self.holder.clone().unwrap_or_else(default_holder))
    }
}

/// Business hours for slot generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilitySettings {
    /// IANA time zone name, e.g. `America/Chicago`.
    pub timezone: String,
    pub start_hour: u32,
    pub end_hour: u32,
    pub slot_minutes: u32,
}

impl Default for AvailabilitySettings {
    fn default() -> Self {
        let defaults = AvailabilityConfig::default();
        Self {
            timezone: defaults.timezone.name().to_string(),
            start_hour: defaults.start_hour,
            end_hour: defaults.end_hour,
            slot_minutes: defaults.slot_minutes,
        }
    }
}

impl AvailabilitySettings {
    pub fn time_zone(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| format!("unknown time zone {:?}", self.timezone))
    }

    pub fn to_availability_config(&self) -> Result<AvailabilityConfig, String> {
        Ok(AvailabilityConfig::new()
            .with_timezone(self.time_zone()?)
            .with_hours(self.start_hour, self.end_hour)
            .with_slot_minutes(self.slot_minutes))
    }
}

impl AppConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("remodelcal")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("remodelcal")
    }

    /// Checks every section and reports the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref functions) = self.functions {
            functions.to_client_config()?;
        }
        self.google.to_provider_config().validate()?;
        self.outlook.to_provider_config().validate()?;
        if let Some(ref apple) = self.apple {
            apple.to_provider_config().validate()?;
        }
        self.sync.to_sync_config().validate()?;
        self.availability.to_availability_config()?.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.functions.is_none());
        assert!(config.apple.is_none());
        assert_eq!(config.sync.policy, ConflictPolicy::RemoteWins);
        assert_eq!(config.sync.lock_ttl_secs, 600);
        assert_eq!(config.google.calendar_id, "primary");
        assert_eq!(config.availability.timezone, "UTC");
        assert!(config.validate().is_ok());
        assert!(config.store.resolved_path().ends_with("remodelcal/store.json"));
    }

    #[test]
    fn full_config_round_trips_into_library_configs() {
        let toml_content = r#"
[store]
path = "/var/lib/remodelcal/store.json"

[functions]
base_url = "https://abc.supabase.co/functions/v1"
api_key = "anon-key"

[google]
calendar_id = "jobs@group.calendar.google.com"
timeout_secs = 10

[apple]
calendar_url = "https://caldav.icloud.com/{account_id}/calendars/home/"

[sync]
policy = "merge"
lookahead_days = 30
lock_ttl_secs = 120
holder = "web-1"

[availability]
timezone = "America/Chicago"
start_hour = 8
end_hour = 16
slot_minutes = 30
"#;
        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(
            config.store.resolved_path(),
            PathBuf::from("/var/lib/remodelcal/store.json")
        );

        let google = config.google.to_provider_config();
        assert_eq!(google.calendar_id, "jobs@group.calendar.google.com");
        assert_eq!(google.timeout, Duration::from_secs(10));
        assert_eq!(google.api_base, GoogleConfig::DEFAULT_API_BASE);

        let sync = config.sync.to_sync_config();
        assert_eq!(sync.policy, ConflictPolicy::Merge);
        assert_eq!(sync.lookahead_days, 30);
        assert_eq!(sync.lookbehind_days, 30);
        assert_eq!(sync.lock_ttl, chrono::Duration::seconds(120));
        assert_eq!(sync.holder, "web-1");

        let availability = config.availability.to_availability_config().unwrap();
        assert_eq!(availability.timezone, chrono_tz::America::Chicago);
        assert_eq!(availability.slot_minutes, 30);

        let functions = config.functions.unwrap().to_client_config().unwrap();
        assert_eq!(functions.api_key, "anon-key");
    }

    #[test]
    fn api_key_env_reference() {
        unsafe {
            std::env::set_var("_REMODELCAL_TEST_API_KEY", "from-env");
        }
        let settings = FunctionsSettings {
            base_url: "https://abc.supabase.co/functions/v1".to_string(),
            api_key: "env::_REMODELCAL_TEST_API_KEY".to_string(),
            timeout_secs: 5,
        };
        let config = settings.to_client_config().unwrap();
        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.timeout, Duration::from_secs(5));
        unsafe {
            std::env::remove_var("_REMODELCAL_TEST_API_KEY");
        }
    }

    #[test]
    fn invalid_values_fail_validation() {
        let config: AppConfig = toml::from_str("[availability]\ntimezone = \"Mars/Olympus\"\n").unwrap();
        assert!(config.validate().unwrap_err().contains("Mars/Olympus"));

        let config: AppConfig = toml::from_str("[sync]\nlock_ttl_secs = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: AppConfig =
            toml::from_str("[sync]\nlookahead_days = 100000000\nlock_ttl_secs = 9223372036854775807\n")
                .unwrap();
        assert!(config.validate().is_err());

        let config: AppConfig = toml::from_str("[apple]\ncalendar_url = \"\"\n").unwrap();
        assert!(config.validate().is_err());

        assert!(toml::from_str::<AppConfig>("[sync]\npolicy = \"coin_flip\"\n").is_err());
    }

    #[test]
    fn dump_skips_unset_sections() {
        let dumped = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(dumped.contains("[google]"));
        assert!(dumped.contains("policy = \"remote_wins\""));
        assert!(!dumped.contains("[functions]"));
        assert!(!dumped.contains("[apple]"));
    }
}
