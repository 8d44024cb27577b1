//! PostgreSQL [`SyncStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syncline_core::{Provider, TenantAware, TenantId};
use syncline_sync::{
    EntityBatch, LocalEntity, NaturalKey, OAuthCredential, ProviderConnection, StoreResult,
    SyncStore,
};
use tracing::{debug, instrument};

use crate::error::DbError;
use crate::pool::DbPool;
use crate::rows::{ConnectionRow, CredentialRow, EntityRow};

/// Durable store backed by the `sync_*` tables.
///
/// Entity bodies are stored as JSONB and addressed by
/// `(tenant_id, natural_key)`. A batch commit runs in one transaction.
#[derive(Debug, Clone)]
pub struct PgSyncStore {
    pool: DbPool,
}

impl PgSyncStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = DbPool::connect(database_url).await?;
        crate::migrations::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Every connection regardless of provider, for listings.
    pub async fn all_connections(&self) -> Result<Vec<ProviderConnection>, DbError> {
        let rows: Vec<ConnectionRow> = sqlx::query_as(
            r"
            SELECT id, tenant_id, provider, external_account_ref, created_at, last_synced_at
            FROM sync_connections
            ORDER BY tenant_id, provider
            ",
        )
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter().map(ProviderConnection::try_from).collect()
    }

    /// Number of entities stored for a tenant.
    pub async fn entity_count(&self, tenant: TenantId) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sync_entities WHERE tenant_id = $1")
                .bind(tenant.as_uuid())
                .fetch_one(self.pool.inner())
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn list_connections(&self, provider: Provider) -> StoreResult<Vec<ProviderConnection>> {
        let rows: Vec<ConnectionRow> = sqlx::query_as(
            r"
            SELECT id, tenant_id, provider, external_account_ref, created_at, last_synced_at
            FROM sync_connections
            WHERE provider = $1
            ORDER BY tenant_id
            ",
        )
        .bind(provider.as_str())
        .fetch_all(self.pool.inner())
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(ProviderConnection::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_connection(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<ProviderConnection>> {
        let row: Option<ConnectionRow> = sqlx::query_as(
            r"
            SELECT id, tenant_id, provider, external_account_ref, created_at, last_synced_at
            FROM sync_connections
            WHERE tenant_id = $1 AND provider = $2
            ",
        )
        .bind(tenant.as_uuid())
        .bind(provider.as_str())
        .fetch_optional(self.pool.inner())
        .await
        .map_err(DbError::from)?;

        Ok(row.map(ProviderConnection::try_from).transpose()?)
    }

    async fn save_connection(&self, connection: &ProviderConnection) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO sync_connections (
                id, tenant_id, provider, external_account_ref, created_at, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, provider) DO UPDATE SET
                id = EXCLUDED.id,
                external_account_ref = EXCLUDED.external_account_ref,
                created_at = EXCLUDED.created_at,
                last_synced_at = EXCLUDED.last_synced_at
            ",
        )
        .bind(connection.id.as_uuid())
        .bind(connection.tenant_id.as_uuid())
        .bind(connection.provider.as_str())
        .bind(&connection.external_account_ref)
        .bind(connection.created_at)
        .bind(connection.last_synced_at)
        .execute(self.pool.inner())
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn load_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<OAuthCredential>> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r"
            SELECT connection_id, access_token, refresh_token, expires_at, last_refreshed_at
            FROM sync_credentials
            WHERE tenant_id = $1 AND provider = $2
            ",
        )
        .bind(tenant.as_uuid())
        .bind(provider.as_str())
        .fetch_optional(self.pool.inner())
        .await
        .map_err(DbError::from)?;

        Ok(row.map(OAuthCredential::from))
    }

    #[instrument(skip(self, credential), fields(tenant_id = %tenant, provider = %provider))]
    async fn save_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
        credential: &OAuthCredential,
    ) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO sync_credentials (
                tenant_id, provider, connection_id, access_token, refresh_token,
                expires_at, last_refreshed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id, provider) DO UPDATE SET
                connection_id = EXCLUDED.connection_id,
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                last_refreshed_at = EXCLUDED.last_refreshed_at,
                updated_at = NOW()
            ",
        )
        .bind(tenant.as_uuid())
        .bind(provider.as_str())
        .bind(credential.connection_id.as_uuid())
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(credential.last_refreshed_at)
        .execute(self.pool.inner())
        .await
        .map_err(DbError::from)?;
        debug!("Credential saved");
        Ok(())
    }

    async fn find_entity(
        &self,
        tenant: TenantId,
        key: &NaturalKey,
    ) -> StoreResult<Option<LocalEntity>> {
        let row: Option<EntityRow> = sqlx::query_as(
            r"
            SELECT id, body
            FROM sync_entities
            WHERE tenant_id = $1 AND natural_key = $2
            ",
        )
        .bind(tenant.as_uuid())
        .bind(key.to_string())
        .fetch_optional(self.pool.inner())
        .await
        .map_err(DbError::from)?;

        Ok(row.map(LocalEntity::try_from).transpose()?)
    }

    #[instrument(skip(self, batch), fields(tenant_id = %tenant, entities = batch.len()))]
    async fn commit(&self, tenant: TenantId, batch: EntityBatch) -> StoreResult<()> {
        batch.check_tenant(tenant)?;
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.inner().begin().await.map_err(DbError::from)?;
        for entity in &batch.entities {
            let body = serde_json::to_value(entity)?;
            // An existing key keeps its surrogate id, also inside the body.
            sqlx::query(
                r"
                INSERT INTO sync_entities (id, tenant_id, kind, natural_key, body)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id, natural_key) DO UPDATE SET
                    body = jsonb_set(EXCLUDED.body, '{id}', to_jsonb(sync_entities.id)),
                    updated_at = NOW()
                ",
            )
            .bind(entity.id().as_uuid())
            .bind(entity.tenant_id().as_uuid())
            .bind(entity.kind().as_str())
            .bind(entity.natural_key().to_string())
            .bind(body)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        }
        tx.commit().await.map_err(DbError::from)?;

        debug!("Entity batch committed");
        Ok(())
    }

    async fn record_sync(
        &self,
        tenant: TenantId,
        provider: Provider,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r"
            UPDATE sync_connections
            SET last_synced_at = $3
            WHERE tenant_id = $1 AND provider = $2
            ",
        )
        .bind(tenant.as_uuid())
        .bind(provider.as_str())
        .bind(at)
        .execute(self.pool.inner())
        .await
        .map_err(DbError::from)?;
        Ok(())
    }
}
