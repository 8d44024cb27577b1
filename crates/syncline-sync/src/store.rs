//! Persistence seam.
//!
//! The engine only needs keyed lookups and one atomic batch write per tenant
//! run. [`InMemoryStore`](crate::memory::InMemoryStore) and the PostgreSQL
//! store in `syncline-db` implement it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syncline_core::{Provider, TenantAware, TenantId};

use crate::credential::{OAuthCredential, ProviderConnection};
use crate::entity::{LocalEntity, NaturalKey};
use crate::error::{StoreError, StoreResult};

/// Entities touched by one reconciliation, written together.
#[derive(Debug, Clone, Default)]
pub struct EntityBatch {
    pub entities: Vec<LocalEntity>,
}

impl EntityBatch {
    #[must_use]
    pub fn new(entities: Vec<LocalEntity>) -> Self {
        Self { entities }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every entity must belong to `tenant`.
    pub fn check_tenant(&self, tenant: TenantId) -> StoreResult<()> {
        match self.entities.iter().find(|e| !e.belongs_to(tenant)) {
            Some(stray) => Err(StoreError::TenantMismatch {
                expected: tenant,
                found: stray.tenant_id(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Every connection for a provider, across tenants.
    async fn list_connections(&self, provider: Provider) -> StoreResult<Vec<ProviderConnection>>;

    async fn find_connection(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<ProviderConnection>>;

    /// Insert or replace the (tenant, provider) connection.
    async fn save_connection(&self, connection: &ProviderConnection) -> StoreResult<()>;

    async fn load_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<OAuthCredential>>;

    async fn save_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
        credential: &OAuthCredential,
    ) -> StoreResult<()>;

    async fn find_entity(
        &self,
        tenant: TenantId,
        key: &NaturalKey,
    ) -> StoreResult<Option<LocalEntity>>;

    /// Write the whole batch or nothing.
    async fn commit(&self, tenant: TenantId, batch: EntityBatch) -> StoreResult<()>;

    /// Stamp the connection's `last_synced_at`.
    async fn record_sync(
        &self,
        tenant: TenantId,
        provider: Provider,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::MetricsBlob;

    #[test]
    fn test_check_tenant() {
        let tenant = TenantId::new();
        let other = TenantId::new();
        let mut batch = EntityBatch::new(vec![LocalEntity::Metrics(MetricsBlob::new(
            tenant,
            Provider::GoogleGbp,
            Utc::now(),
        ))]);
        assert!(batch.check_tenant(tenant).is_ok());

        batch.entities.push(LocalEntity::Metrics(MetricsBlob::new(
            other,
            Provider::GoogleGbp,
            Utc::now(),
        )));
        match batch.check_tenant(tenant) {
            Err(StoreError::TenantMismatch { expected, found }) => {
                assert_eq!(expected, tenant);
                assert_eq!(found, other);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
