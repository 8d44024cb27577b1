//! OpenPhone connector configuration.

use std::env::VarError;
use std::time::Duration;

use syncline_sync::config::{read_or, ConfigError};

pub const DEFAULT_API_BASE: &str = "https://api.openphone.com/v1";

#[derive(Debug, Clone)]
pub struct OpenPhoneConfig {
    pub api_base: String,
    /// `limit` sent with every list request.
    pub page_size: u32,
    /// Per stream (calls, messages).
    pub max_pages: u32,
    pub request_timeout: Duration,
}

impl Default for OpenPhoneConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: 50,
            max_pages: 20,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl OpenPhoneConfig {
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let defaults = Self::default();
        let config = Self {
            api_base: read_or(&reader, "OPENPHONE_API_BASE", defaults.api_base)?,
            page_size: read_or(&reader, "OPENPHONE_PAGE_SIZE", defaults.page_size)?,
            max_pages: read_or(&reader, "OPENPHONE_MAX_PAGES", defaults.max_pages)?,
            request_timeout: Duration::from_secs(read_or(
                &reader,
                "OPENPHONE_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.api_base)
            .map_err(|e| ConfigError::InvalidValue("OPENPHONE_API_BASE".into(), e.to_string()))?;
        if !(1..=100).contains(&self.page_size) {
            return Err(ConfigError::InvalidValue(
                "OPENPHONE_PAGE_SIZE".into(),
                "must be between 1 and 100".into(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidValue(
                "OPENPHONE_MAX_PAGES".into(),
                "must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
