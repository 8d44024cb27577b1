//! Sync orchestration per provider.
//!
//! `run_for_tenant` walks one tenant through token load, optional refresh,
//! fetch and reconcile under a deadline. `run_for_all_tenants` fans that out
//! over every connected tenant with a bounded worker pool. Neither returns an
//! error: every failure becomes a [`TenantOutcome::Failed`] for that tenant,
//! and a failure to list tenants is carried on the [`BatchOutcome`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use syncline_core::{Clock, Provider, SystemClock, TenantId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SyncConfig;
use crate::credential::ProviderConnection;
use crate::error::{RefreshError, Result, SyncError};
use crate::fetch::RemoteFetcher;
use crate::reconcile::UpsertReconciler;
use crate::record::RemoteRecord;
use crate::refresh::TokenRefresher;
use crate::report::{RunReporter, TracingReporter};
use crate::result::{BatchOutcome, FailureReason, SyncResult, TenantOutcome};
use crate::run_state::{RunPhase, RunState};
use crate::score::InsightScorer;
use crate::store::SyncStore;
use crate::token_store::TokenStore;

/// Mutable state of one tenant run, readable after a timeout.
struct RunProgress {
    state: RunState,
    result: SyncResult,
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    provider: Provider,
    store: Arc<dyn SyncStore>,
    tokens: TokenStore,
    refresher: Option<Arc<dyn TokenRefresher>>,
    fetcher: Arc<dyn RemoteFetcher>,
    reconciler: UpsertReconciler,
    reporter: Arc<dyn RunReporter>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    /// Wire an orchestrator for the fetcher's provider.
    pub fn new(
        store: Arc<dyn SyncStore>,
        fetcher: Arc<dyn RemoteFetcher>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let provider = fetcher.provider();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Ok(Self {
            provider,
            tokens: TokenStore::new(store.clone()),
            reconciler: UpsertReconciler::new(store.clone())
                .with_clock(clock.clone())
                .with_window_days(config.metrics_window_days),
            store,
            refresher: None,
            fetcher,
            reporter: Arc::new(TracingReporter),
            clock,
            config,
        })
    }

    /// Required for OAuth providers whose tokens expire.
    #[must_use]
    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn RunReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reconciler = self.reconciler.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn InsightScorer>) -> Self {
        self.reconciler = self.reconciler.with_scorer(scorer);
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one tenant to completion or failure.
    #[instrument(skip(self), fields(tenant_id = %tenant, provider = %self.provider))]
    pub async fn run_for_tenant(&self, tenant: TenantId) -> TenantOutcome {
        let mut progress = RunProgress {
            state: RunState::new(),
            result: SyncResult::new(tenant, self.provider, self.clock.now()),
        };

        let deadline = self.config.tenant_timeout;
        let run = tokio::time::timeout(deadline, self.drive(tenant, &mut progress)).await;
        let run = match run {
            Ok(run) => run,
            Err(_) => Err(SyncError::Timeout { after: deadline }),
        };

        self.finish(progress, run)
    }

    /// Reconcile records pushed by a webhook. Skips the token and fetch phases.
    #[instrument(skip(self, records), fields(tenant_id = %tenant, provider = %self.provider, records = records.len()))]
    pub async fn ingest(&self, tenant: TenantId, records: Vec<RemoteRecord>) -> TenantOutcome {
        let mut progress = RunProgress {
            state: RunState::new(),
            result: SyncResult::new(tenant, self.provider, self.clock.now()),
        };
        progress.result.records_fetched = records.len();

        let deadline = self.config.tenant_timeout;
        let run = tokio::time::timeout(deadline, async {
            self.require_connection(tenant).await?;
            progress.state.transition(RunPhase::Reconciling)?;
            let tally = self
                .reconciler
                .reconcile_batch(tenant, self.provider, records)
                .await?;
            tally.apply_to(&mut progress.result);
            Ok::<(), SyncError>(())
        })
        .await;
        let run = match run {
            Ok(run) => run,
            Err(_) => Err(SyncError::Timeout { after: deadline }),
        };

        self.finish(progress, run)
    }

    /// True when the tenant has never synced or its last sync is older than
    /// the configured minimum interval.
    pub async fn needs_sync(&self, tenant: TenantId) -> Result<bool> {
        let connection = self.require_connection(tenant).await?;
        let Some(last) = connection.last_synced_at else {
            return Ok(true);
        };
        let interval = ChronoDuration::from_std(self.config.min_sync_interval)
            .map_err(|e| SyncError::configuration(format!("min_sync_interval: {e}")))?;
        Ok(self.clock.now() - last >= interval)
    }

    /// Run the tenant unless it synced recently. `force` always runs.
    ///
    /// Returns `None` when the run was skipped.
    pub async fn run_if_due(&self, tenant: TenantId, force: bool) -> Option<TenantOutcome> {
        if !force {
            match self.needs_sync(tenant).await {
                Ok(false) => {
                    debug!(tenant_id = %tenant, provider = %self.provider, "Synced recently, skipping");
                    return None;
                }
                Ok(true) => {}
                // Let the run itself produce the failure outcome.
                Err(e) => debug!(tenant_id = %tenant, error = %e, "Could not check sync interval"),
            }
        }
        Some(self.run_for_tenant(tenant).await)
    }

    /// Run every tenant connected to this provider.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn run_for_all_tenants(&self) -> BatchOutcome {
        self.run_tenants(false).await
    }

    /// Like [`run_for_all_tenants`](Self::run_for_all_tenants) but skips
    /// tenants that synced within the minimum interval.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn run_due_tenants(&self) -> BatchOutcome {
        self.run_tenants(true).await
    }

    async fn run_tenants(&self, only_due: bool) -> BatchOutcome {
        let tenants: BTreeSet<TenantId> = match self.store.list_connections(self.provider).await {
            Ok(connections) => connections.into_iter().map(|c| c.tenant_id).collect(),
            Err(e) => {
                error!(error = %e, "Failed to list connections");
                let reason = FailureReason::from(&SyncError::from(e));
                return BatchOutcome::listing_failed(self.provider, reason);
            }
        };

        info!(
            tenants = tenants.len(),
            concurrency = self.config.max_concurrent_tenants,
            "Starting sync for connected tenants"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_tenants));
        let mut join_set = JoinSet::new();

        for tenant in tenants {
            let this = self.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                // Hold the permit until the tenant run completes.
                let _permit = semaphore.acquire_owned().await.ok();
                let provider = this.provider;
                let clock = this.clock.clone();
                let reporter = this.reporter.clone();

                // A panicking run must not take the pool down with it.
                let run = tokio::spawn(async move {
                    if only_due {
                        this.run_if_due(tenant, false).await
                    } else {
                        Some(this.run_for_tenant(tenant).await)
                    }
                });

                let outcome = match run.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(tenant_id = %tenant, error = %e, "Tenant task aborted");
                        let mut partial = SyncResult::new(tenant, provider, clock.now());
                        partial.finished_at = Some(clock.now());
                        let outcome = TenantOutcome::Failed {
                            reason: FailureReason::Internal {
                                detail: format!("tenant task aborted: {e}"),
                            },
                            partial,
                        };
                        reporter.report(&outcome);
                        Some(outcome)
                    }
                };
                (tenant, outcome)
            });
        }

        let mut batch = BatchOutcome::new(self.provider);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((tenant, Some(outcome))) => {
                    batch.outcomes.insert(tenant, outcome);
                }
                Ok((_, None)) => {}
                Err(e) => error!(error = %e, "Tenant worker failed to join"),
            }
        }

        info!(
            tenants = batch.outcomes.len(),
            failed = batch.failed_count(),
            "Finished sync for connected tenants"
        );
        batch
    }

    async fn require_connection(
        &self,
        tenant: TenantId,
    ) -> Result<ProviderConnection> {
        self.store
            .find_connection(tenant, self.provider)
            .await?
            .ok_or_else(|| SyncError::connection_missing(tenant, self.provider))
    }

    async fn drive(&self, tenant: TenantId, progress: &mut RunProgress) -> Result<()> {
        progress.state.transition(RunPhase::TokenLoading)?;
        let connection = self.require_connection(tenant).await?;

        let access_token = if self.provider.requires_credential() {
            let credential = self.tokens.load(tenant, self.provider).await?;

            let credential = if credential.is_expired(self.clock.now()) {
                progress.state.transition(RunPhase::TokenRefreshing)?;
                if !credential.can_refresh() {
                    return Err(RefreshError::NoRefreshToken.into());
                }
                let refresher = self.refresher.as_ref().ok_or_else(|| {
                    SyncError::configuration(format!(
                        "{} credential expired and no refresher is configured",
                        self.provider
                    ))
                })?;
                let refreshed = refresher.refresh(&credential).await?;
                self.tokens.save(tenant, self.provider, &refreshed).await?;
                debug!("Access token refreshed");
                refreshed
            } else {
                credential
            };

            Some(credential.access_token)
        } else {
            None
        };

        progress.state.transition(RunPhase::Fetching)?;
        let mut pages = self
            .fetcher
            .open(access_token.as_deref(), &connection, connection.last_synced_at)
            .await?;

        let mut records = Vec::new();
        while let Some(page) = pages.next_page().await {
            progress.result.records_fetched += page.len();
            records.extend(page);
        }

        for kind in self.fetcher.required_kinds() {
            let present = records.iter().any(|r| r.kind == *kind);
            let reasons: Vec<&str> = pages
                .failures()
                .iter()
                .filter(|f| f.kind == *kind)
                .map(|f| f.reason.as_str())
                .collect();
            if !present && !reasons.is_empty() {
                warn!(kind = %kind, failed_pages = reasons.len(), "Required record kind missing");
                progress.result.push_error(
                    kind.as_str(),
                    format!(
                        "no {kind} records: {} page(s) failed ({})",
                        reasons.len(),
                        reasons.join("; ")
                    ),
                );
            }
        }

        progress.state.transition(RunPhase::Reconciling)?;
        let tally = self
            .reconciler
            .reconcile_batch(tenant, self.provider, records)
            .await?;
        tally.apply_to(&mut progress.result);

        // The batch is already committed; a missed stamp only makes the next
        // run come due sooner.
        if let Err(e) = self
            .store
            .record_sync(tenant, self.provider, self.clock.now())
            .await
        {
            warn!(error = %e, "Failed to record sync time");
        }

        Ok(())
    }

    fn finish(&self, mut progress: RunProgress, run: Result<()>) -> TenantOutcome {
        progress.result.finished_at = Some(self.clock.now());

        let outcome = match run.and_then(|()| progress.state.transition(RunPhase::Done)) {
            Ok(()) => TenantOutcome::Completed(progress.result),
            Err(err) => {
                let reached = progress.state.phase();
                if let Err(e) = progress.state.transition(RunPhase::Failed) {
                    debug!(error = %e, "Run already terminal");
                }
                debug!(phase = %reached, error = %err, "Tenant run failed");
                TenantOutcome::Failed {
                    reason: FailureReason::from(&err),
                    partial: progress.result,
                }
            }
        };

        self.reporter.report(&outcome);
        outcome
    }
}
