//! Terminal output helpers for consistent CLI formatting

use syncline_sync::{ProviderConnection, TenantOutcome};

/// Check if color output is enabled
fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a success message (green checkmark)
pub fn print_success(message: &str) {
    if use_color() {
        println!("\x1b[32m✓\x1b[0m {}", message);
    } else {
        println!("OK: {}", message);
    }
}

/// Print a warning message (yellow)
pub fn print_warning(message: &str) {
    if use_color() {
        eprintln!("\x1b[33mWarning:\x1b[0m {}", message);
    } else {
        eprintln!("Warning: {}", message);
    }
}

/// Print an info message (blue)
pub fn print_info(message: &str) {
    if use_color() {
        println!("\x1b[34mℹ\x1b[0m {}", message);
    } else {
        println!("Info: {}", message);
    }
}

/// Print a key-value pair with consistent formatting
pub fn print_key_value(key: &str, value: &str) {
    if use_color() {
        println!("  \x1b[1m{}:\x1b[0m {}", key, value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// One-line summary of a tenant run.
pub fn outcome_summary(outcome: &TenantOutcome) -> String {
    let result = outcome.result();
    let counts = format!(
        "fetched {}, created {}, updated {}, skipped {}",
        result.records_fetched,
        result.records_created,
        result.records_updated,
        result.records_skipped
    );
    match outcome.failure_reason() {
        None => format!("{} {}: {}", result.tenant_id, result.provider, counts),
        Some(reason) => format!(
            "{} {}: FAILED ({}) after {}",
            result.tenant_id, result.provider, reason, counts
        ),
    }
}

/// Print a tenant run with its per-record errors.
pub fn print_outcome(outcome: &TenantOutcome) {
    let summary = outcome_summary(outcome);
    if outcome.is_completed() {
        print_success(&summary);
    } else {
        print_warning(&summary);
        if outcome.failure_reason().is_some_and(|r| r.needs_relink()) {
            eprintln!("  Re-link the provider for this tenant to resume syncing.");
        }
    }
    for error in &outcome.result().errors {
        print_key_value(&error.record_ref, &error.reason);
    }
}

/// Tab-separated connection row.
pub fn connection_row(connection: &ProviderConnection) -> String {
    let last_synced = connection
        .last_synced_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{}\t{}\t{}\t{}",
        connection.tenant_id, connection.provider, connection.external_account_ref, last_synced
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use syncline_core::{Provider, TenantId};
    use syncline_sync::{FailureReason, SyncResult};

    fn result() -> SyncResult {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let mut result = SyncResult::new(TenantId::new(), Provider::LeadgenSheet, at);
        result.records_fetched = 3;
        result.records_created = 2;
        result.records_skipped = 1;
        result
    }

    #[test]
    fn test_completed_summary() {
        let outcome = TenantOutcome::Completed(result());
        let summary = outcome_summary(&outcome);
        assert!(summary.contains("leadgen_sheet"));
        assert!(summary.ends_with("fetched 3, created 2, updated 0, skipped 1"));
    }

    #[test]
    fn test_failed_summary_names_reason() {
        let outcome = TenantOutcome::Failed {
            reason: FailureReason::Timeout { after_secs: 300 },
            partial: result(),
        };
        let summary = outcome_summary(&outcome);
        assert!(summary.contains("FAILED (sync timed out after 300s)"));
    }

    #[test]
    fn test_connection_row() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let mut connection = ProviderConnection::new(TenantId::new(), Provider::Openphone, "PN1", at);
        assert!(connection_row(&connection).ends_with("openphone\tPN1\tnever"));

        connection.last_synced_at = Some(at);
        assert!(connection_row(&connection).ends_with("PN1\t2024-06-01T09:00:00+00:00"));
    }
}
