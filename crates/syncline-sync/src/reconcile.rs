//! Upsert reconciliation of remote records into local entities.
//!
//! For each record: derive its natural key, look the entity up (this batch
//! first, then the store), create or merge, and collect everything touched.
//! The batch is written with a single [`SyncStore::commit`] at the end, so a
//! failure mid-batch leaves the tenant's stored state untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use syncline_core::{Clock, Provider, SystemClock, TenantId};
use tracing::{debug, instrument, warn};

use crate::entity::{LocalEntity, NaturalKey};
use crate::error::Result;
use crate::record::RemoteRecord;
use crate::result::{RecordError, SyncResult};
use crate::score::{InsightScorer, TieredVisibilityScorer};
use crate::store::{EntityBatch, SyncStore};

/// Counts from one reconciliation, applied to a [`SyncResult`] after commit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileTally {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RecordError>,
}

impl ReconcileTally {
    pub fn apply_to(self, result: &mut SyncResult) {
        result.records_created += self.created;
        result.records_updated += self.updated;
        result.records_skipped += self.skipped;
        result.errors.extend(self.errors);
    }
}

struct Touched {
    entity: LocalEntity,
    is_new: bool,
}

#[derive(Clone)]
pub struct UpsertReconciler {
    store: Arc<dyn SyncStore>,
    scorer: Arc<dyn InsightScorer>,
    clock: Arc<dyn Clock>,
    window_days: u32,
}

impl UpsertReconciler {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self {
            store,
            scorer: Arc::new(TieredVisibilityScorer),
            clock: Arc::new(SystemClock),
            window_days: 30,
        }
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn InsightScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Window used for "new review" counting.
    #[must_use]
    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    /// Reconcile a batch into a fresh result.
    pub async fn reconcile(
        &self,
        tenant: TenantId,
        provider: Provider,
        records: Vec<RemoteRecord>,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::new(tenant, provider, self.clock.now());
        result.records_fetched = records.len();
        let tally = self.reconcile_batch(tenant, provider, records).await?;
        tally.apply_to(&mut result);
        result.finished_at = Some(self.clock.now());
        Ok(result)
    }

    /// Reconcile and commit. Counts are only returned once the commit succeeds.
    #[instrument(skip(self, records), fields(tenant_id = %tenant, provider = %provider, records = records.len()))]
    pub async fn reconcile_batch(
        &self,
        tenant: TenantId,
        provider: Provider,
        records: Vec<RemoteRecord>,
    ) -> Result<ReconcileTally> {
        let now = self.clock.now();
        let mut tally = ReconcileTally::default();
        let mut working: BTreeMap<NaturalKey, Touched> = BTreeMap::new();

        for record in &records {
            let record_ref = record.record_ref();

            let key = match NaturalKey::for_record(provider, record) {
                Ok(key) => key,
                Err(reason) => {
                    skip(&mut tally, record_ref, reason);
                    continue;
                }
            };

            if !working.contains_key(&key) {
                if let Some(existing) = self.store.find_entity(tenant, &key).await? {
                    working.insert(
                        key.clone(),
                        Touched {
                            entity: existing,
                            is_new: false,
                        },
                    );
                }
            }

            match working.get_mut(&key) {
                Some(touched) => match touched.entity.merge_record(provider, record, now) {
                    Ok(changed) => {
                        tally.updated += 1;
                        debug!(key = %key, changed, "Merged record into existing entity");
                    }
                    Err(reason) => skip(&mut tally, record_ref, reason),
                },
                None => match LocalEntity::from_record(&key, tenant, provider, record, now) {
                    Ok(entity) => {
                        tally.created += 1;
                        working.insert(key, Touched { entity, is_new: true });
                    }
                    Err(reason) => skip(&mut tally, record_ref, reason),
                },
            }
        }

        let mut entities = Vec::with_capacity(working.len());
        let mut new_entities = 0usize;
        for (_, touched) in working {
            let mut entity = touched.entity;
            if let LocalEntity::Metrics(blob) = &mut entity {
                blob.refresh_review_summary(now, self.window_days);
                blob.score = self.scorer.score(blob);
            }
            new_entities += usize::from(touched.is_new);
            entities.push(entity);
        }

        if !entities.is_empty() {
            self.store
                .commit(tenant, EntityBatch::new(entities))
                .await?;
        }

        debug!(
            created = tally.created,
            updated = tally.updated,
            skipped = tally.skipped,
            new_entities,
            "Reconciled batch"
        );
        Ok(tally)
    }
}

fn skip(tally: &mut ReconcileTally, record_ref: String, reason: String) {
    warn!(record_ref = %record_ref, reason = %reason, "Skipping record");
    tally.skipped += 1;
    tally.errors.push(RecordError { record_ref, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::record::RecordKind;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn record(kind: RecordKind, id: &str, payload: Value) -> RemoteRecord {
        let Value::Object(map) = payload else {
            panic!("payload must be an object")
        };
        RemoteRecord::new(id, kind, map, Utc::now())
    }

    #[tokio::test]
    async fn test_duplicate_key_within_batch_creates_once() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = UpsertReconciler::new(store.clone());
        let tenant = TenantId::new();

        let result = reconciler
            .reconcile(
                tenant,
                Provider::LeadgenSheet,
                vec![
                    record(RecordKind::Lead, "row-2", json!({"email": "a@x.com"})),
                    record(
                        RecordKind::Lead,
                        "row-3",
                        json!({"email": "A@X.COM", "phone": "555"}),
                    ),
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.records_created, 1);
        assert_eq!(result.records_updated, 1);
        assert_eq!(store.entity_count(tenant).await, 1);
        let lead = store.entities(tenant).await.remove(0);
        assert_eq!(lead.as_lead().unwrap().phone.as_deref(), Some("555"));
    }

    #[tokio::test]
    async fn test_metrics_blob_is_scored_after_merge() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = UpsertReconciler::new(store.clone());
        let tenant = TenantId::new();

        let result = reconciler
            .reconcile(
                tenant,
                Provider::GoogleGbp,
                vec![
                    record(
                        RecordKind::Metric,
                        "PROFILE_VIEWS",
                        json!({"metric": "PROFILE_VIEWS", "total": 700}),
                    ),
                    record(RecordKind::Review, "r1", json!({"star_rating": 5})),
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.records_created, 1);
        assert_eq!(result.records_updated, 1);
        let blob = store
            .find_entity(tenant, &NaturalKey::metrics(Provider::GoogleGbp))
            .await
            .unwrap()
            .unwrap();
        let blob = blob.as_metrics().unwrap();
        assert_eq!(blob.review_summary.total, 1);
        assert_eq!(blob.score, Some(50 + 15 + 15));
    }

    #[tokio::test]
    async fn test_custom_scorer() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = UpsertReconciler::new(store.clone())
            .with_scorer(Arc::new(|_: &crate::entity::MetricsBlob| -> Option<i64> { Some(7) }));
        let tenant = TenantId::new();

        reconciler
            .reconcile(
                tenant,
                Provider::GoogleGbp,
                vec![record(RecordKind::Metric, "PHONE_CALLS", json!({"total": 3}))],
            )
            .await
            .unwrap();

        let stored = store.entities(tenant).await;
        assert_eq!(stored[0].as_metrics().unwrap().score, Some(7));
    }

    #[tokio::test]
    async fn test_invalid_review_is_skipped_but_blob_kept() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = UpsertReconciler::new(store.clone());
        let tenant = TenantId::new();

        let result = reconciler
            .reconcile(
                tenant,
                Provider::GoogleGbp,
                vec![
                    record(RecordKind::Metric, "PROFILE_VIEWS", json!({"total": 1})),
                    record(RecordKind::Review, "r-bad", json!({"star_rating": 0})),
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.records_created, 1);
        assert_eq!(result.records_skipped, 1);
        assert_eq!(result.errors[0].record_ref, "review:r-bad");
    }

    #[tokio::test]
    async fn test_empty_batch_commits_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = UpsertReconciler::new(store.clone());
        let tenant = TenantId::new();

        let result = reconciler
            .reconcile(tenant, Provider::Openphone, Vec::new())
            .await
            .unwrap();
        assert_eq!(result.records_applied(), 0);
        assert!(result.finished_at.is_some());
        assert_eq!(store.entity_count(tenant).await, 0);
    }
}
