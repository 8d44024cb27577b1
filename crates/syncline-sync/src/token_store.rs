//! Credential lookup and persistence for tenant runs.

use std::sync::Arc;

use syncline_core::{Provider, TenantId};
use tracing::{debug, instrument};

use crate::credential::OAuthCredential;
use crate::error::{Result, SyncError};
use crate::store::SyncStore;

/// Loads and saves credentials through the [`SyncStore`]. No retries.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn SyncStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Fails with [`SyncError::CredentialMissing`] when nothing is stored.
    #[instrument(skip(self), fields(tenant_id = %tenant, provider = %provider))]
    pub async fn load(&self, tenant: TenantId, provider: Provider) -> Result<OAuthCredential> {
        self.store
            .load_credential(tenant, provider)
            .await?
            .ok_or_else(|| SyncError::credential_missing(tenant, provider))
    }

    #[instrument(skip(self, credential), fields(tenant_id = %tenant, provider = %provider))]
    pub async fn save(
        &self,
        tenant: TenantId,
        provider: Provider,
        credential: &OAuthCredential,
    ) -> Result<()> {
        self.store
            .save_credential(tenant, provider, credential)
            .await?;
        debug!(expires_at = ?credential.expires_at, "Saved credential");
        Ok(())
    }
}
