//! remodelcal CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use remodelcal_cli::cli::{Cli, Command, ConfigAction, LogFormat};
use remodelcal_cli::commands::{self, Context};
use remodelcal_cli::config::AppConfig;
use remodelcal_cli::error::{CliError, CliResult};
use remodelcal_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = match (cli.debug, cli.log_format) {
        (true, LogFormat::Pretty) => TracingConfig::cli_debug(),
        (true, format) => TracingConfig::cli_debug().with_format(format.into()),
        (false, LogFormat::Json) => TracingConfig::daemon().with_level(Level::WARN),
        (false, format) => TracingConfig::default()
            .with_level(Level::WARN)
            .with_format(format.into()),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", CliError::from(e));
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let (config, config_path) = load_config(cli.config.as_ref())?;
    let json = cli.json;

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path, &config),
        },
        command => {
            let context = Context::open(&config)?;
            dispatch(&context, command, json).await
        }
    }
}

async fn dispatch(context: &Context, command: Command, json: bool) -> CliResult<()> {
    match command {
        Command::Sync { user, policy } => commands::sync::run(context, &user, policy, json).await,
        Command::Events { user, days, from } => {
            commands::view::events(context, &user, from, days, json).await
        }
        Command::Slots { user, date } => commands::view::slots(context, &user, date, json).await,
        Command::Sources { user } => commands::view::sources(context, &user, json).await,
        Command::Status { user } => commands::view::status(context, &user, json).await,
        Command::Conflicts { user } => commands::view::conflicts(context, &user, json).await,
        Command::Accounts { action } => commands::accounts::run(context, action, json).await,
        Command::Book {
            user,
            title,
            start,
            end,
            notes,
        } => commands::appointments::book(context, &user, &title, start, end, notes, json).await,
        Command::Cancel { user, id } => commands::appointments::cancel(context, &user, &id, json).await,
        Command::Config { .. } => Err(CliError::invalid("config commands do not open the store")),
    }
}

/// Loads the explicit config file, or the default one when it exists.
fn load_config(explicit: Option<&PathBuf>) -> CliResult<(AppConfig, PathBuf)> {
    match explicit {
        Some(path) => Ok((AppConfig::load_from(path).map_err(CliError::Config)?, path.clone())),
        None => Ok((AppConfig::load().map_err(CliError::Config)?, AppConfig::default_path())),
    }
}
