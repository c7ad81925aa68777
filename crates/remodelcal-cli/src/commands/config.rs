//! Configuration commands.

use std::path::Path;

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Prints the effective configuration as TOML.
pub fn dump(config: &AppConfig, path: &Path) -> CliResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| CliError::config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validates every section, resolving secret references.
pub fn validate(config: &AppConfig) -> CliResult<()> {
    config.validate().map_err(CliError::config)?;
    if config.functions.is_none() {
        println!("note: [functions] is not set; OAuth connect and token refresh are unavailable.");
    }
    if config.apple.is_none() {
        println!("note: [apple] is not set; Apple accounts will fail to sync.");
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Prints the configuration and store paths.
pub fn path(config_path: &Path, config: &AppConfig) -> CliResult<()> {
    println!("config: {}", config_path.display());
    println!("store:  {}", config.store.resolved_path().display());
    Ok(())
}
