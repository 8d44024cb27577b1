//! `syncline sync`: run a provider sync for one tenant or all of them.

use std::sync::Arc;

use clap::Args;
use syncline_core::{Provider, TenantId};
use syncline_db::PgSyncStore;
use syncline_sync::BatchOutcome;
use uuid::Uuid;

use crate::config::{CliConfig, ConnectorConfig};
use crate::engine::build_orchestrator;
use crate::error::{CliError, CliResult};
use crate::output::{print_info, print_outcome};

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Provider to sync: google_gbp, openphone, leadgen_sheet or leadgen_campaign
    #[arg(long, short = 'p')]
    pub provider: Provider,

    /// Sync a single tenant instead of every connected tenant
    #[arg(long, short = 't')]
    pub tenant: Option<Uuid>,

    /// Run even when the tenant synced recently
    #[arg(long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, config: &CliConfig) -> CliResult<()> {
    let connector = ConnectorConfig::from_env(args.provider)?;
    let store = Arc::new(PgSyncStore::connect(&config.database_url).await?);
    let orchestrator = build_orchestrator(args.provider, connector, store, &config.sync)?;

    let batch = match args.tenant {
        Some(id) => {
            let tenant = TenantId::from_uuid(id);
            match orchestrator.run_if_due(tenant, args.force).await {
                Some(outcome) => {
                    let mut batch = BatchOutcome::new(args.provider);
                    batch.outcomes.insert(tenant, outcome);
                    batch
                }
                None => {
                    if args.json {
                        let empty = BatchOutcome::new(args.provider);
                        println!("{}", serde_json::to_string_pretty(&empty)?);
                    } else {
                        print_info(&format!(
                            "Tenant {tenant} synced {} recently; use --force to run anyway",
                            args.provider
                        ));
                    }
                    return Ok(());
                }
            }
        }
        None if args.force => orchestrator.run_for_all_tenants().await,
        None => orchestrator.run_due_tenants().await,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
    } else if batch.listing_error.is_none() && batch.outcomes.is_empty() {
        print_info(&format!("No tenants due for {}", args.provider));
    } else {
        for outcome in batch.outcomes.values() {
            print_outcome(outcome);
        }
    }

    check_batch(&batch)
}

/// Fail the command when the tenant listing or any tenant run failed.
fn check_batch(batch: &BatchOutcome) -> CliResult<()> {
    if let Some(reason) = &batch.listing_error {
        return Err(CliError::Database(format!(
            "could not list {} connections: {reason}",
            batch.provider
        )));
    }
    let failed = batch.failed_count();
    if failed > 0 {
        return Err(CliError::SyncFailed {
            failed,
            total: batch.outcomes.len(),
        });
    }
    Ok(())
}
