//! Outlook adapter configuration.

use std::time::Duration;

/// Configuration for the Microsoft Graph adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlookConfig {
    /// Graph v1.0 base URL.
    pub api_base: String,
    pub timeout: Duration,
    /// Page size hint sent as `$top`.
    pub page_size: u32,
}

impl OutlookConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://graph.microsoft.com/v1.0";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
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

    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.api_base)
            .map_err(|e| format!("invalid outlook api_base {:?}: {}", self.api_base, e))?;
        if self.page_size == 0 {
            return Err("outlook page_size must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for OutlookConfig {
    fn default() -> Self {
        Self {
            api_base: Self::DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}
