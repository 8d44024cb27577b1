//! Provider connections and their stored credentials.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use syncline_core::{ConnectionId, Provider, TenantAware, TenantId};

/// A tenant's link to one provider. At most one per (tenant, provider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConnection {
    pub id: ConnectionId,
    pub tenant_id: TenantId,
    pub provider: Provider,
    /// Provider-side account reference: a GBP location path, a phone number
    /// id, a sheet URL or a campaign id.
    pub external_account_ref: String,
    pub created_at: DateTime<Utc>,
    /// Set after each committed sync.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ProviderConnection {
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        provider: Provider,
        external_account_ref: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            tenant_id,
            provider,
            external_account_ref: external_account_ref.into(),
            created_at,
            last_synced_at: None,
        }
    }
}

impl TenantAware for ProviderConnection {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Access credential for a connection.
///
/// API-key providers store the key as `access_token` with no refresh token
/// and no expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    pub connection_id: ConnectionId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` means the token never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl OAuthCredential {
    /// A static API key credential.
    #[must_use]
    pub fn api_key(connection_id: ConnectionId, key: impl Into<String>) -> Self {
        Self {
            connection_id,
            access_token: key.into(),
            refresh_token: None,
            expires_at: None,
            last_refreshed_at: None,
        }
    }

    /// Expired iff `expires_at <= now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

impl fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("connection_id", &self.connection_id)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("last_refreshed_at", &self.last_refreshed_at)
            .finish()
    }
}
