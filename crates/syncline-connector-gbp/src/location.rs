//! Location resource names.

use std::fmt;
use std::str::FromStr;

use syncline_sync::SyncError;

/// `accounts/{account}/locations/{location}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRef {
    pub account_id: String,
    pub location_id: String,
}

impl LocationRef {
    /// Path relative to the API base.
    #[must_use]
    pub fn path(&self) -> String {
        format!("accounts/{}/locations/{}", self.account_id, self.location_id)
    }
}

impl fmt::Display for LocationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for LocationRef {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().trim_matches('/').split('/').collect();
        match parts.as_slice() {
            ["accounts", account, "locations", location]
                if !account.is_empty() && !location.is_empty() =>
            {
                Ok(Self {
                    account_id: (*account).to_string(),
                    location_id: (*location).to_string(),
                })
            }
            _ => Err(SyncError::configuration(format!(
                "expected accounts/{{account}}/locations/{{location}}, got '{s}'"
            ))),
        }
    }
}
