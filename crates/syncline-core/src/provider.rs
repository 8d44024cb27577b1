//! Third-party providers and their authentication modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A remote system the engine can synchronize from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Google Business Profile: daily metrics and reviews.
    GoogleGbp,
    /// Phone/SMS provider: call and message logs.
    Openphone,
    /// Public spreadsheet CSV export of leads.
    LeadgenSheet,
    /// Leadgen service campaign results.
    LeadgenCampaign,
}

/// How a provider connection authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Access token with optional refresh token and expiry.
    OAuth,
    /// Static API key stored as the access token. Never expires.
    ApiKey,
    /// No credential at all.
    Public,
}

impl Provider {
    /// Every known provider, in a stable order.
    pub const ALL: [Provider; 4] = [
        Provider::GoogleGbp,
        Provider::Openphone,
        Provider::LeadgenSheet,
        Provider::LeadgenCampaign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GoogleGbp => "google_gbp",
            Provider::Openphone => "openphone",
            Provider::LeadgenSheet => "leadgen_sheet",
            Provider::LeadgenCampaign => "leadgen_campaign",
        }
    }

    pub fn auth_mode(&self) -> AuthMode {
        match self {
            Provider::GoogleGbp => AuthMode::OAuth,
            Provider::Openphone => AuthMode::ApiKey,
            Provider::LeadgenSheet | Provider::LeadgenCampaign => AuthMode::Public,
        }
    }

    /// Whether a stored credential must exist before fetching.
    pub fn requires_credential(&self) -> bool {
        self.auth_mode() != AuthMode::Public
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::OAuth => "oauth",
            AuthMode::ApiKey => "api_key",
            AuthMode::Public => "public",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a provider name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProviderError(pub String);

impl fmt::Display for ParseProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider: {}", self.0)
    }
}

impl std::error::Error for ParseProviderError {}

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google_gbp" | "gbp" => Ok(Provider::GoogleGbp),
            "openphone" => Ok(Provider::Openphone),
            "leadgen_sheet" | "google_sheets" => Ok(Provider::LeadgenSheet),
            "leadgen_campaign" | "leadgen" => Ok(Provider::LeadgenCampaign),
            other => Err(ParseProviderError(other.to_string())),
        }
    }
}
