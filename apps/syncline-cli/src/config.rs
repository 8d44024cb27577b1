//! CLI configuration.
//!
//! Shared settings come from [`CliConfig`]; connector settings are loaded
//! only for the provider a command touches, so syncing the sheet never
//! requires Google client credentials.

use std::env::VarError;

use syncline_connector_gbp::GbpConfig;
use syncline_connector_leadgen::LeadgenConfig;
use syncline_connector_openphone::OpenPhoneConfig;
use syncline_core::Provider;
use syncline_sync::config::{read_or, read_required};
use syncline_sync::{ConfigError, SyncConfig};

pub const DEFAULT_LOG_FILTER: &str = "info,syncline=debug";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub database_url: String,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub log_json: bool,
    pub sync: SyncConfig,
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        Ok(Self {
            database_url: read_required(&reader, "DATABASE_URL")?,
            log_filter: read_or(&reader, "SYNCLINE_LOG", DEFAULT_LOG_FILTER.to_string())?,
            log_json: read_or(&reader, "SYNCLINE_LOG_JSON", false)?,
            sync: SyncConfig::from_reader(&reader)?,
        })
    }
}

/// Settings for the connector behind one provider.
#[derive(Debug)]
pub enum ConnectorConfig {
    Gbp(GbpConfig),
    OpenPhone(OpenPhoneConfig),
    Leadgen(LeadgenConfig),
}

impl ConnectorConfig {
    pub fn from_env(provider: Provider) -> Result<Self, ConfigError> {
        Self::from_reader(provider, |key| std::env::var(key))
    }

    pub fn from_reader<F>(provider: Provider, reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        Ok(match provider {
            Provider::GoogleGbp => Self::Gbp(GbpConfig::from_reader(reader)?),
            Provider::Openphone => Self::OpenPhone(OpenPhoneConfig::from_reader(reader)?),
            Provider::LeadgenSheet | Provider::LeadgenCampaign => {
                Self::Leadgen(LeadgenConfig::from_reader(reader)?)
            }
        })
    }
}
