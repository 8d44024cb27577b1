//! Engine configuration.
//!
//! Every component gets its settings through an injected struct. Loading from
//! the environment goes through a reader closure so tests never touch the
//! process environment.

use std::env::VarError;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SyncError;
use crate::retry::RetryConfig;

/// Longest metrics window a provider is asked for, in days. Provider
/// performance APIs keep about eighteen months of daily data.
pub const MAX_WINDOW_DAYS: u32 = 540;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        SyncError::configuration(err.to_string())
    }
}

/// Read `key` and parse it, falling back to `default` when unset.
pub fn read_or<T, F>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Read a required variable.
pub fn read_required<F>(reader: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    reader(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

/// Settings shared by every orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum tenant runs in flight at once.
    pub max_concurrent_tenants: usize,
    /// Deadline for one tenant run, token load through commit.
    pub tenant_timeout: Duration,
    /// Tenants synced more recently than this are skipped unless forced.
    pub min_sync_interval: Duration,
    /// Trailing window for metric reports and "new review" counting.
    pub metrics_window_days: u32,
    /// Retry policy for provider HTTP calls.
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tenants: 5,
            tenant_timeout: Duration::from_secs(300),
            min_sync_interval: Duration::from_secs(6 * 60 * 60),
            metrics_window_days: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let defaults = Self::default();

        let max_concurrent_tenants = read_or(
            &reader,
            "SYNC_MAX_CONCURRENT_TENANTS",
            defaults.max_concurrent_tenants,
        )?;
        let tenant_timeout_secs = read_or(
            &reader,
            "SYNC_TENANT_TIMEOUT_SECS",
            defaults.tenant_timeout.as_secs(),
        )?;
        let min_sync_interval_secs = read_or(
            &reader,
            "SYNC_MIN_INTERVAL_SECS",
            defaults.min_sync_interval.as_secs(),
        )?;
        let metrics_window_days =
            read_or(&reader, "SYNC_METRICS_WINDOW_DAYS", defaults.metrics_window_days)?;
        let max_retries = read_or(&reader, "SYNC_HTTP_MAX_RETRIES", defaults.retry.max_retries)?;

        let config = Self {
            max_concurrent_tenants,
            tenant_timeout: Duration::from_secs(tenant_timeout_secs),
            min_sync_interval: Duration::from_secs(min_sync_interval_secs),
            metrics_window_days,
            retry: RetryConfig {
                max_retries,
                ..defaults.retry
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or disable the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tenants == 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_MAX_CONCURRENT_TENANTS".into(),
                "must be at least 1".into(),
            ));
        }
        if self.tenant_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SYNC_TENANT_TIMEOUT_SECS".into(),
                "must be greater than zero".into(),
            ));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.metrics_window_days) {
            return Err(ConfigError::InvalidValue(
                "SYNC_METRICS_WINDOW_DAYS".into(),
                format!("must be between 1 and {MAX_WINDOW_DAYS}"),
            ));
        }
        Ok(())
    }
}
