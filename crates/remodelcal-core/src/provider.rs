//! Calendar provider identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A third-party calendar service a user can connect.
///
/// The declaration order is the provider order used when a choice has to be
/// made between accounts (e.g. promoting a new primary account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Calendar (Calendar API v3).
    Google,
    /// Outlook / Microsoft 365 (Microsoft Graph).
    Outlook,
    /// Apple iCloud Calendar (CalDAV).
    Apple,
}

impl ProviderKind {
    /// All providers, in provider order.
    pub const ALL: [ProviderKind; 3] = [Self::Google, Self::Outlook, Self::Apple];

    /// Returns the lowercase name used in config files and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Outlook => "outlook",
            Self::Apple => "apple",
        }
    }

    /// Returns the display color used when an account has none configured.
    pub fn default_color(&self) -> &'static str {
        match self {
            Self::Google => "#4285F4",
            Self::Outlook => "#0078D4",
            Self::Apple => "#A2AAAD",
        }
    }

    /// Returns the name of the serverless function handling this provider's
    /// OAuth exchange and refresh.
    pub fn auth_function(&self) -> &'static str {
        match self {
            Self::Google => "google-calendar-auth",
            Self::Outlook => "outlook-calendar-auth",
            Self::Apple => "apple-calendar-sync",
        }
    }

    /// Returns the backend table holding this provider's credentials.
    pub fn token_table(&self) -> &'static str {
        match self {
            Self::Google => "google_calendar_tokens",
            Self::Outlook => "outlook_calendar_tokens",
            Self::Apple => "apple_calendar_tokens",
        }
    }

    /// Returns true if the provider issues refreshable OAuth tokens.
    pub fn uses_oauth(&self) -> bool {
        !matches!(self, Self::Apple)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown calendar provider: {0} (expected google, outlook or apple)")]
pub struct ParseProviderKindError(pub String);

impl FromStr for ProviderKind {
    type Err = ParseProviderKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "outlook" | "microsoft" => Ok(Self::Outlook),
            "apple" | "icloud" => Ok(Self::Apple),
            other => Err(ParseProviderKindError(other.to_string())),
        }
    }
}
