//! Leadgen connector configuration.

use std::env::VarError;
use std::time::Duration;

use syncline_sync::config::{read_or, ConfigError};

/// Host serving public spreadsheet CSV exports.
pub const DEFAULT_EXPORT_BASE: &str = "https://docs.google.com";

/// In-cluster address of the lead generation service.
pub const DEFAULT_SERVICE_BASE: &str = "http://leadgen:3000";

#[derive(Debug, Clone)]
pub struct LeadgenConfig {
    pub export_base: String,
    pub service_base: String,
    /// Records per page handed to the engine.
    pub page_size: usize,
    pub sheet_timeout: Duration,
    /// Campaign results are assembled on request and can take minutes.
    pub campaign_timeout: Duration,
}

impl Default for LeadgenConfig {
    fn default() -> Self {
        Self {
            export_base: DEFAULT_EXPORT_BASE.to_string(),
            service_base: DEFAULT_SERVICE_BASE.to_string(),
            page_size: 100,
            sheet_timeout: Duration::from_secs(30),
            campaign_timeout: Duration::from_secs(300),
        }
    }
}

impl LeadgenConfig {
    #[must_use]
    pub fn with_base_urls(
        mut self,
        export_base: impl Into<String>,
        service_base: impl Into<String>,
    ) -> Self {
        self.export_base = export_base.into();
        self.service_base = service_base.into();
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
            export_base: read_or(&reader, "LEADGEN_EXPORT_BASE", defaults.export_base)?,
            service_base: read_or(&reader, "LEADGEN_SERVICE_BASE", defaults.service_base)?,
            page_size: read_or(&reader, "LEADGEN_PAGE_SIZE", defaults.page_size)?,
            sheet_timeout: Duration::from_secs(read_or(
                &reader,
                "LEADGEN_SHEET_TIMEOUT_SECS",
                defaults.sheet_timeout.as_secs(),
            )?),
            campaign_timeout: Duration::from_secs(read_or(
                &reader,
                "LEADGEN_CAMPAIGN_TIMEOUT_SECS",
                defaults.campaign_timeout.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("LEADGEN_EXPORT_BASE", &self.export_base),
            ("LEADGEN_SERVICE_BASE", &self.service_base),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string()))?;
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "LEADGEN_PAGE_SIZE".into(),
                "must be at least 1".into(),
            ));
        }
        if self.sheet_timeout.is_zero() || self.campaign_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "LEADGEN_*_TIMEOUT_SECS".into(),
                "must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
