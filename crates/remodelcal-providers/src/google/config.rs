//! Google Calendar adapter configuration.

use std::time::Duration;

/// Configuration for the Google Calendar adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    /// Calendar API v3 base URL.
    pub api_base: String,
    /// Calendar to sync (`primary` for the account's main calendar).
    pub calendar_id: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Page size for `events.list`.
    pub page_size: u32,
}

impl GoogleConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";
    pub const DEFAULT_CALENDAR_ID: &'static str = "primary";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_PAGE_SIZE: u32 = 250;

    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL (used to point tests at a mock server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.api_base)
            .map_err(|e| format!("invalid google api_base {:?}: {}", self.api_base, e))?;
        if self.calendar_id.trim().is_empty() {
            return Err("google calendar_id must not be empty".to_string());
        }
        if self.page_size == 0 {
            return Err("google page_size must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_base: Self::DEFAULT_API_BASE.to_string(),
            calendar_id: Self::DEFAULT_CALENDAR_ID.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}
