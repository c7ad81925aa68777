//! Command-line interface definition.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use remodelcal_core::{ConflictPolicy, ProviderKind, TracingOutputFormat};

/// remodelcal - calendar sync for remodeling appointments
#[derive(Debug, Parser)]
#[command(name = "remodelcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "REMODELCAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for TracingOutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
            LogFormat::Json => Self::Json,
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a full sync pass for a user
    Sync {
        #[arg(long, short)]
        user: String,

        /// Conflict policy for this pass (overrides the configured one)
        #[arg(long)]
        policy: Option<ConflictPolicy>,
    },

    /// Show events from every enabled calendar
    Events {
        #[arg(long, short)]
        user: String,

        /// Number of days to show
        #[arg(long, default_value_t = 7)]
        days: i64,

        /// First day to show (defaults to today)
        #[arg(long)]
        from: Option<NaiveDate>,
    },

    /// Show bookable slots for a day
    Slots {
        #[arg(long, short)]
        user: String,

        /// Day in YYYY-MM-DD form
        #[arg(long)]
        date: NaiveDate,
    },

    /// Show connected calendars
    Sources {
        #[arg(long, short)]
        user: String,
    },

    /// Show the last sync pass
    Status {
        #[arg(long, short)]
        user: String,
    },

    /// Show recorded sync conflicts
    Conflicts {
        #[arg(long, short)]
        user: String,
    },

    /// Calendar account commands
    Accounts {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Create a local appointment
    Book {
        #[arg(long, short)]
        user: String,

        #[arg(long)]
        title: String,

        /// Start time (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End time (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a local appointment
    Cancel {
        #[arg(long, short)]
        user: String,

        /// Appointment id
        #[arg(long)]
        id: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Account actions.
#[derive(Debug, Subcommand)]
pub enum AccountAction {
    /// List connected accounts
    List {
        #[arg(long, short)]
        user: String,
    },

    /// Finish an OAuth connection with the code from the callback
    Connect {
        #[arg(long, short)]
        user: String,

        /// google or outlook
        provider: ProviderKind,

        /// Authorization code
        #[arg(long)]
        code: String,

        /// Redirect URI used when requesting the code
        #[arg(long)]
        redirect_uri: String,
    },

    /// Connect an iCloud calendar with an app-specific password
    ConnectApple {
        #[arg(long, short)]
        user: String,

        #[arg(long)]
        apple_id: String,

        /// App-specific password (supports `pass::` and `env::` prefixes)
        #[arg(long, env = "REMODELCAL_APPLE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Remove an account
    Disconnect {
        #[arg(long, short)]
        user: String,

        provider: ProviderKind,
    },

    /// Include an account in sync passes
    Enable {
        #[arg(long, short)]
        user: String,

        provider: ProviderKind,
    },

    /// Leave an account out of sync passes
    Disable {
        #[arg(long, short)]
        user: String,

        provider: ProviderKind,
    },

    /// Make an account the one new appointments are pushed to
    Primary {
        #[arg(long, short)]
        user: String,

        provider: ProviderKind,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the current configuration
    Dump,

    /// Validate the configuration
    Validate,

    /// Show the configuration file path
    Path,
}
