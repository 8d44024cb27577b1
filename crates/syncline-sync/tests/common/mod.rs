//! Shared fixtures for syncline-sync integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use syncline_core::{ConnectionId, ManualClock, Provider, TenantId};
use syncline_sync::{
    EntityBatch, InMemoryStore, LocalEntity, NaturalKey, OAuthCredential, PageFailure,
    ProviderConnection, RecordKind, RecordPages, RefreshError, RemoteFetcher, RemoteRecord,
    Result, RunReporter, StaticPages, StoreError, StoreResult, SyncStore, TenantOutcome,
    TokenRefresher,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

pub fn lead(external_id: &str, payload: Value) -> RemoteRecord {
    record(RecordKind::Lead, external_id, payload)
}

pub fn record(kind: RecordKind, external_id: &str, payload: Value) -> RemoteRecord {
    let Value::Object(map) = payload else {
        panic!("payload must be an object")
    };
    RemoteRecord::new(external_id, kind, map, t0())
}

/// Link `tenant` to `provider` and store `credential` if given.
pub async fn link(
    store: &InMemoryStore,
    tenant: TenantId,
    provider: Provider,
    credential: Option<OAuthCredential>,
) -> ProviderConnection {
    let connection = ProviderConnection::new(tenant, provider, "acct-ref", t0());
    store.save_connection(&connection).await.unwrap();
    if let Some(mut credential) = credential {
        credential.connection_id = connection.id;
        store
            .save_credential(tenant, provider, &credential)
            .await
            .unwrap();
    }
    connection
}

pub fn oauth_credential(expires_at: Option<DateTime<Utc>>, refresh: Option<&str>) -> OAuthCredential {
    OAuthCredential {
        connection_id: ConnectionId::new(),
        access_token: "access-0".to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at,
        last_refreshed_at: None,
    }
}

/// What the scripted fetcher does for one tenant.
#[derive(Clone, Default)]
pub struct FetchPlan {
    pub pages: Vec<Vec<RemoteRecord>>,
    pub failures: Vec<PageFailure>,
    pub delay: Option<Duration>,
    pub panic: bool,
    /// Hang forever once the scripted pages are drained.
    pub stall: bool,
}

impl FetchPlan {
    pub fn records(records: Vec<RemoteRecord>) -> Self {
        Self {
            pages: vec![records],
            ..Self::default()
        }
    }
}

/// Fetcher that replays per-tenant plans, keyed by the connection's tenant.
pub struct ScriptedFetcher {
    provider: Provider,
    required: Vec<RecordKind>,
    plans: Mutex<HashMap<TenantId, FetchPlan>>,
    tokens_seen: Mutex<Vec<Option<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            required: Vec::new(),
            plans: Mutex::new(HashMap::new()),
            tokens_seen: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn requiring(mut self, kinds: Vec<RecordKind>) -> Self {
        self.required = kinds;
        self
    }

    pub fn plan(self, tenant: TenantId, plan: FetchPlan) -> Self {
        self.plans.lock().unwrap().insert(tenant, plan);
        self
    }

    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens_seen.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFetcher for ScriptedFetcher {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn required_kinds(&self) -> &[RecordKind] {
        &self.required
    }

    async fn open(
        &self,
        access_token: Option<&str>,
        connection: &ProviderConnection,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Box<dyn RecordPages>> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(access_token.map(str::to_string));
        let plan = self
            .plans
            .lock()
            .unwrap()
            .get(&connection.tenant_id)
            .cloned()
            .unwrap_or_default();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if plan.panic {
            panic!("scripted fetcher panic");
        }
        let pages = StaticPages::new(plan.pages, plan.failures);
        if plan.stall {
            return Ok(Box::new(StallingPages { inner: pages }));
        }
        Ok(Box::new(pages))
    }
}

struct StallingPages {
    inner: StaticPages,
}

#[async_trait]
impl RecordPages for StallingPages {
    async fn next_page(&mut self) -> Option<Vec<RemoteRecord>> {
        match self.inner.next_page().await {
            Some(page) => Some(page),
            None => std::future::pending().await,
        }
    }

    fn failures(&self) -> &[PageFailure] {
        self.inner.failures()
    }
}

/// Refresher that succeeds unless the credential's access token is listed.
#[derive(Default)]
pub struct ScriptedRefresher {
    reject_tokens: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedRefresher {
    pub fn rejecting(tokens: &[&str]) -> Self {
        Self {
            reject_tokens: tokens.iter().map(|t| t.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(
        &self,
        credential: &OAuthCredential,
    ) -> std::result::Result<OAuthCredential, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_tokens.contains(&credential.access_token) {
            return Err(RefreshError::Rejected {
                status: 400,
                body: json!({"error": "invalid_grant"}).to_string(),
            });
        }
        Ok(OAuthCredential {
            access_token: format!("{}-refreshed", credential.access_token),
            expires_at: Some(t0() + chrono::Duration::hours(1)),
            last_refreshed_at: Some(t0()),
            ..credential.clone()
        })
    }
}

/// Collects every reported outcome.
#[derive(Default)]
pub struct RecordingReporter {
    pub outcomes: Mutex<Vec<TenantOutcome>>,
}

impl RunReporter for RecordingReporter {
    fn report(&self, outcome: &TenantOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

/// Delegates to an [`InMemoryStore`] but fails the chosen operations.
pub struct FaultyStore {
    pub inner: InMemoryStore,
    fail_listing: bool,
    fail_commit: bool,
}

impl FaultyStore {
    pub fn commit_fails(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_listing: false,
            fail_commit: true,
        }
    }

    pub fn listing_fails(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_listing: true,
            fail_commit: false,
        }
    }
}

#[async_trait]
impl SyncStore for FaultyStore {
    async fn list_connections(&self, provider: Provider) -> StoreResult<Vec<ProviderConnection>> {
        if self.fail_listing {
            return Err(StoreError::backend("db down"));
        }
        self.inner.list_connections(provider).await
    }

    async fn find_connection(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<ProviderConnection>> {
        self.inner.find_connection(tenant, provider).await
    }

    async fn save_connection(&self, connection: &ProviderConnection) -> StoreResult<()> {
        self.inner.save_connection(connection).await
    }

    async fn load_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
    ) -> StoreResult<Option<OAuthCredential>> {
        self.inner.load_credential(tenant, provider).await
    }

    async fn save_credential(
        &self,
        tenant: TenantId,
        provider: Provider,
        credential: &OAuthCredential,
    ) -> StoreResult<()> {
        self.inner.save_credential(tenant, provider, credential).await
    }

    async fn find_entity(
        &self,
        tenant: TenantId,
        key: &NaturalKey,
    ) -> StoreResult<Option<LocalEntity>> {
        self.inner.find_entity(tenant, key).await
    }

    async fn commit(&self, tenant: TenantId, batch: EntityBatch) -> StoreResult<()> {
        if self.fail_commit {
            return Err(StoreError::backend("disk full"));
        }
        self.inner.commit(tenant, batch).await
    }

    async fn record_sync(
        &self,
        tenant: TenantId,
        provider: Provider,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner.record_sync(tenant, provider, at).await
    }
}
