//! Logging setup for remodelcal binaries.
//!
//! Sync passes log with structured fields (`user_id`, `provider`, counts), so
//! JSON output is the one to use when logs are shipped to a collector.
//! Everything goes to stderr; stdout is left to command output.
//!
//! ```ignore
//! use remodelcal_core::tracing::{init_tracing, TracingConfig, TracingOutputFormat};
//!
//! init_tracing(TracingConfig::default().with_format(TracingOutputFormat::Json))?;
//! ```

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber was already installed.
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, human oriented.
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line.
    Json,
}

/// How [`init_tracing`] configures the global subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for remodelcal targets when `RUST_LOG` is unset.
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Print file and line of each event.
    pub location: bool,
    pub timestamps: bool,
    /// Log span open and close.
    pub span_events: bool,
    /// Explicit filter directive; wins over `RUST_LOG` and `level`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Pretty,
            location: false,
            timestamps: true,
            span_events: false,
            filter: None,
        }
    }
}

impl TracingConfig {
    /// Compact debug output for `--debug`.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: TracingOutputFormat::Compact,
            location: true,
            timestamps: false,
            ..Self::default()
        }
    }

    /// JSON output for unattended runs (cron, serverless).
    #[must_use]
    pub fn daemon() -> Self {
        Self {
            format: TracingOutputFormat::Json,
            location: true,
            span_events: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        match self.filter {
            Some(ref directive) => Ok(EnvFilter::try_new(directive)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(self.level)))),
        }
    }

    fn layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let spans = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.location)
            .with_line_number(self.location)
            .with_span_events(spans);

        match (self.format, self.timestamps) {
            (TracingOutputFormat::Pretty, _) => base.pretty().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
            (TracingOutputFormat::Json, _) => base.json().boxed(),
        }
    }
}

/// The filter used when `RUST_LOG` is unset.
///
/// Every crate target starts with `remodelcal`, so one directive covers the
/// workspace and leaves dependencies (reqwest, hyper) quiet.
pub fn default_directive(level: Level) -> String {
    format!("remodelcal={}", level.as_str().to_ascii_lowercase())
}

/// Installs the global subscriber. Call once, early in `main`.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the filter directive does
/// not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let subscriber = tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(config.layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let default = TracingConfig::default();
        assert_eq!(default.level, Level::INFO);
        assert_eq!(default.format, TracingOutputFormat::Pretty);
        assert!(default.timestamps && !default.location && !default.span_events);

        let debug = TracingConfig::cli_debug();
        assert_eq!(debug.level, Level::DEBUG);
        assert_eq!(debug.format, TracingOutputFormat::Compact);
        assert!(debug.location && !debug.timestamps);

        let daemon = TracingConfig::daemon().with_level(Level::WARN);
        assert_eq!(daemon.level, Level::WARN);
        assert_eq!(daemon.format, TracingOutputFormat::Json);
        assert!(daemon.span_events);
    }

    #[test]
    fn directive_covers_workspace() {
        assert_eq!(default_directive(Level::WARN), "remodelcal=warn");
        assert_eq!(default_directive(Level::TRACE), "remodelcal=trace");
    }

    #[test]
    fn explicit_filter_is_parsed() {
        let config = TracingConfig::default().with_env_filter("remodelcal_sync=trace,reqwest=warn");
        assert!(config.env_filter().is_ok());
    }
}
