//! Row types and their conversion into engine types.

use chrono::{DateTime, Utc};
use syncline_core::{ConnectionId, Provider, TenantId};
use syncline_sync::{LocalEntity, OAuthCredential, ProviderConnection};
use uuid::Uuid;

use crate::error::DbError;

fn parse_provider(raw: &str) -> Result<Provider, DbError> {
    raw.parse()
        .map_err(|e: syncline_core::ParseProviderError| DbError::invalid_row("provider", e.to_string()))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ConnectionRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider: String,
    pub external_account_ref: String,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<ConnectionRow> for ProviderConnection {
    type Error = DbError;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        Ok(ProviderConnection {
            id: ConnectionId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            provider: parse_provider(&row.provider)?,
            external_account_ref: row.external_account_ref,
            created_at: row.created_at,
            last_synced_at: row.last_synced_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct CredentialRow {
    pub connection_id: Uuid,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl From<CredentialRow> for OAuthCredential {
    fn from(row: CredentialRow) -> Self {
        OAuthCredential {
            connection_id: ConnectionId::from_uuid(row.connection_id),
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
            last_refreshed_at: row.last_refreshed_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EntityRow {
    pub id: Uuid,
    pub body: serde_json::Value,
}

impl TryFrom<EntityRow> for LocalEntity {
    type Error = DbError;

    fn try_from(row: EntityRow) -> Result<Self, Self::Error> {
        let entity: LocalEntity = serde_json::from_value(row.body)
            .map_err(|e| DbError::invalid_row("body", e.to_string()))?;
        if *entity.id().as_uuid() != row.id {
            return Err(DbError::invalid_row(
                "body",
                format!("body id {} does not match row id {}", entity.id(), row.id),
            ));
        }
        Ok(entity)
    }
}
