//! Apple (iCloud CalDAV) adapter configuration.

use std::time::Duration;

use url::Url;

/// Configuration for the iCloud CalDAV adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleConfig {
    /// Calendar collection URL.
    ///
    /// `{account_id}` is replaced with the URL-encoded Apple ID, so one
    /// template can serve several users.
    pub calendar_url: String,
    pub timeout: Duration,
}

impl AppleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(calendar_url: impl Into<String>) -> Self {
        Self {
            calendar_url: calendar_url.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the collection URL for an account, with a trailing slash.
    pub fn collection_url(&self, account_id: &str) -> Result<Url, url::ParseError> {
        let mut raw = self
            .calendar_url
            .replace("{account_id}", &urlencoding::encode(account_id));
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.calendar_url.trim().is_empty() {
            return Err("apple calendar_url is not set".to_string());
        }
        self.collection_url("account")
            .map(|_| ())
            .map_err(|e| format!("invalid apple calendar_url {:?}: {}", self.calendar_url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_url_gets_trailing_slash() {
        let config = AppleConfig::new("https://caldav.icloud.com/123/calendars/home");
        assert_eq!(
            config.collection_url("me@icloud.com").unwrap().as_str(),
            "https://caldav.icloud.com/123/calendars/home/"
        );
    }

    #[test]
    fn collection_url_substitutes_account() {
        let config = AppleConfig::new("https://dav.example.com/{account_id}/calendar/");
        assert_eq!(
            config.collection_url("me@icloud.com").unwrap().as_str(),
            "https://dav.example.com/me%40icloud.com/calendar/"
        );
    }

    #[test]
    fn validation() {
        assert!(AppleConfig::new("").validate().is_err());
        assert!(AppleConfig::new("relative/path").validate().is_err());
        assert!(AppleConfig::new("https://caldav.icloud.com/1/calendars/home/").validate().is_ok());
    }
}
