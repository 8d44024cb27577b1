//! Sink for one structured event per tenant run.

use tracing::{info, warn};

use crate::result::TenantOutcome;

pub trait RunReporter: Send + Sync {
    fn report(&self, outcome: &TenantOutcome);
}

/// Emits each outcome as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn report(&self, outcome: &TenantOutcome) {
        let result = outcome.result();
        let duration_ms = result
            .finished_at
            .map(|end| (end - result.started_at).num_milliseconds());

        match outcome {
            TenantOutcome::Completed(_) => info!(
                tenant_id = %result.tenant_id,
                provider = %result.provider,
                fetched = result.records_fetched,
                created = result.records_created,
                updated = result.records_updated,
                skipped = result.records_skipped,
                errors = result.errors.len(),
                duration_ms = ?duration_ms,
                "Tenant sync completed"
            ),
            TenantOutcome::Failed { reason, .. } => warn!(
                tenant_id = %result.tenant_id,
                provider = %result.provider,
                reason = %reason,
                fetched = result.records_fetched,
                errors = result.errors.len(),
                duration_ms = ?duration_ms,
                "Tenant sync failed"
            ),
        }
    }
}
