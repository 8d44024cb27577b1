//! Google Business Profile connector configuration.

use std::env::VarError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use syncline_sync::config::{read_or, read_required, ConfigError, MAX_WINDOW_DAYS};
use syncline_sync::{HttpTransport, OAuthClient, OAuthRefresher};

pub const DEFAULT_API_BASE: &str = "https://mybusiness.googleapis.com/v4";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Metrics requested for every location, one report call each.
pub const DEFAULT_METRICS: [&str; 4] = [
    "PROFILE_VIEWS",
    "PHONE_CALLS",
    "WEBSITE_CLICKS",
    "DIRECTION_REQUESTS",
];

pub struct GbpConfig {
    pub api_base: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub metrics: Vec<String>,
    /// Trailing report window.
    pub window_days: u32,
    pub review_page_size: u32,
    /// Stop following `nextPageToken` after this many review pages.
    pub max_review_pages: u32,
    pub request_timeout: Duration,
}

impl GbpConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            metrics: DEFAULT_METRICS.iter().map(|m| (*m).to_string()).collect(),
            window_days: 30,
            review_page_size: 50,
            max_review_pages: 20,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Point both the API and token endpoint at another host (tests, proxies).
    #[must_use]
    pub fn with_base_urls(mut self, api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.token_url = token_url.into();
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let client_id = read_required(&reader, "GBP_CLIENT_ID")?;
        let client_secret = read_required(&reader, "GBP_CLIENT_SECRET")?;
        let defaults = Self::new(client_id, client_secret);

        let metrics = match reader("GBP_METRICS") {
            Ok(raw) => raw
                .split(',')
                .map(|m| m.trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .collect(),
            Err(_) => defaults.metrics.clone(),
        };

        let config = Self {
            api_base: read_or(&reader, "GBP_API_BASE", DEFAULT_API_BASE.to_string())?,
            token_url: read_or(&reader, "GBP_TOKEN_URL", DEFAULT_TOKEN_URL.to_string())?,
            metrics,
            window_days: read_or(&reader, "GBP_WINDOW_DAYS", defaults.window_days)?,
            review_page_size: read_or(&reader, "GBP_REVIEW_PAGE_SIZE", defaults.review_page_size)?,
            max_review_pages: read_or(&reader, "GBP_MAX_REVIEW_PAGES", defaults.max_review_pages)?,
            request_timeout: Duration::from_secs(read_or(
                &reader,
                "GBP_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("GBP_API_BASE", &self.api_base), ("GBP_TOKEN_URL", &self.token_url)] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string()))?;
        }
        if self.metrics.is_empty() {
            return Err(ConfigError::InvalidValue(
                "GBP_METRICS".into(),
                "at least one metric is required".into(),
            ));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(ConfigError::InvalidValue(
                "GBP_WINDOW_DAYS".into(),
                format!("must be between 1 and {MAX_WINDOW_DAYS}"),
            ));
        }
        if !(1..=50).contains(&self.review_page_size) {
            return Err(ConfigError::InvalidValue(
                "GBP_REVIEW_PAGE_SIZE".into(),
                "must be between 1 and 50".into(),
            ));
        }
        Ok(())
    }

    /// Client registration for Google's token endpoint.
    #[must_use]
    pub fn oauth_client(&self) -> OAuthClient {
        OAuthClient {
            token_url: self.token_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: SecretString::from(self.client_secret.expose_secret().to_string()),
        }
    }

    /// Refresher for GBP credentials. Pass a transport without retries.
    #[must_use]
    pub fn refresher(&self, transport: Arc<dyn HttpTransport>) -> OAuthRefresher {
        OAuthRefresher::new(transport, self.oauth_client()).with_timeout(self.request_timeout)
    }
}

impl fmt::Debug for GbpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GbpConfig")
            .field("api_base", &self.api_base)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("metrics", &self.metrics)
            .field("window_days", &self.window_days)
            .field("review_page_size", &self.review_page_size)
            .field("max_review_pages", &self.max_review_pages)
            .finish()
    }
}
