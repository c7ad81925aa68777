//! CLI, configuration and command output
//!
//! This crate provides the `remodelcal` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use config::AppConfig;
pub use error::{CliError, CliResult};
