//! In-memory [`SyncStore`].
//!
//! Entities live in an arena keyed by [`EntityId`] with a separate
//! `(tenant, natural key)` index. Used by tests and by embedders that bring
//! their own durability.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syncline_core::{EntityId, Provider, TenantAware, TenantId};
use tokio::sync::RwLock;

use crate::credential::{OAuthCredential, ProviderConnection};
use crate::entity::{LocalEntity, NaturalKey};
use crate::error::StoreResult;
use crate::store::{EntityBatch, SyncStore};

#[derive(Debug, Default)]
struct Inner {
    connections: HashMap<(TenantId, Provider), ProviderConnection>,
    credentials: HashMap<(TenantId, Provider), OAuthCredential>,
    arena: HashMap<EntityId, LocalEntity>,
    index: HashMap<(TenantId, NaturalKey), EntityId>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entities owned by `tenant`, ordered by natural key.
    pub async fn entities(&self, tenant: TenantId) -> Vec<LocalEntity> {
        let inner = self.inner.read().await;
        let mut keyed: Vec<(&NaturalKey, &LocalEntity)> = inner
            .index
            .iter()
            .filter(|((owner, _), _)| *owner == tenant)
            .filter_map(|((_, key), id)| inner.arena.get(id).map(|e| (key, e)))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(b.0));
        keyed.into_iter().map(|(_, e)| e.clone()).collect()
    }

    pub async fn entity_count(&self, tenant: TenantId) -> usize {
        let inner = self.inner.read().await;
        inner.index.keys().filter(|(owner, _)| *owner == tenant).count()
    }
}

#[async_trait]
impl SyncStore for InMemoryStore {
    async fn list_connections(&self, provider: Provider) -> StoreResult<Vec<ProviderConnection>> {
        let inner = self.inner.read().await;
        let mut connections: Vec<ProviderConnection> = inner
            .connections
            .values()
            .filter(|c| c.provider == provider)
            .cloned()
            .collect();
        connections.sort_by_key(|c| c.tenant_id);
        Ok(connections)
    }

    async fn find_connection(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<ProviderConnection>> {
        let inner = self.inner.read().await;
        Ok(inner.connections.get(&(tenant, provider)).cloned())
    }

    async fn save_connection(&self, connection: &ProviderConnection) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.connections.insert(
            (connection.tenant_id, connection.provider),
            connection.clone(),
        );
        Ok(())
    }

    async fn load_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<OAuthCredential>> {
        let inner = self.inner.read().await;
        Ok(inner.credentials.get(&(tenant, provider)).cloned())
    }

    async fn save_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
        credential: &OAuthCredential,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .credentials
            .insert((tenant, provider), credential.clone());
        Ok(())
    }

    async fn find_entity(
        &self,
        tenant: TenantId,
        key: &NaturalKey,
    ) -> StoreResult<Option<LocalEntity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .index
            .get(&(tenant, key.clone()))
            .and_then(|id| inner.arena.get(id))
            .cloned())
    }

    async fn commit(&self, tenant: TenantId, batch: EntityBatch) -> StoreResult<()> {
        batch.check_tenant(tenant)?;

        let mut inner = self.inner.write().await;
        for entity in batch.entities {
            let slot = (entity.tenant_id(), entity.natural_key());
            // An existing key keeps its surrogate id.
            let id = *inner.index.entry(slot).or_insert(entity.id());
            let entity = with_id(entity, id);
            inner.arena.insert(id, entity);
        }
        Ok(())
    }

    async fn record_sync(
        &self,
        tenant: TenantId,
        provider: Provider,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(connection) = inner.connections.get_mut(&(tenant, provider)) {
            connection.last_synced_at = Some(at);
        }
        Ok(())
    }
}

fn with_id(mut entity: LocalEntity, id: EntityId) -> LocalEntity {
    match &mut entity {
        LocalEntity::Lead(e) => e.id = id,
        LocalEntity::CallLog(e) => e.id = id,
        LocalEntity::MessageLog(e) => e.id = id,
        LocalEntity::Metrics(e) => e.id = id,
    }
    entity
}
