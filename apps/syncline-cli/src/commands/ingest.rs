//! `syncline ingest`: apply OpenPhone webhook payloads without a full sync.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, ValueEnum};
use serde_json::Value;
use syncline_connector_openphone::{normalize_webhook, WebhookEvent};
use syncline_core::{Provider, TenantId};
use syncline_db::PgSyncStore;
use syncline_sync::{ProviderConnection, RecordKind, SyncStore};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{CliConfig, ConnectorConfig};
use crate::engine::build_orchestrator;
use crate::error::{CliError, CliResult};
use crate::output::print_outcome;

/// Record kind implied by the webhook route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WebhookKind {
    Call,
    Message,
}

impl From<WebhookKind> for RecordKind {
    fn from(kind: WebhookKind) -> Self {
        match kind {
            WebhookKind::Call => RecordKind::Call,
            WebhookKind::Message => RecordKind::Message,
        }
    }
}

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Webhook JSON file: one payload or an array of them. Reads stdin when omitted or "-"
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Tenant ID (UUID). Routed by phone number ID when omitted
    #[arg(long, short = 't')]
    pub tenant: Option<Uuid>,

    /// Kind to assume when the payload has no event type
    #[arg(long, value_enum)]
    pub kind: Option<WebhookKind>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the ingest command
pub async fn execute(args: IngestArgs, config: &CliConfig) -> CliResult<()> {
    let raw = read_input(args.file.as_ref()).await?;
    let events = parse_events(&raw, args.kind)?;

    let store = Arc::new(PgSyncStore::connect(&config.database_url).await?);
    let tenant = match args.tenant {
        Some(id) => TenantId::from_uuid(id),
        None => {
            let connections = store.list_connections(Provider::Openphone).await?;
            route_tenant(&connections, &events)?
        }
    };
    info!(tenant_id = %tenant, events = events.len(), "Ingesting webhook events");

    let connector = ConnectorConfig::from_env(Provider::Openphone)?;
    let orchestrator = build_orchestrator(Provider::Openphone, connector, store, &config.sync)?;
    let records = events.into_iter().map(|e| e.record).collect();
    let outcome = orchestrator.ingest(tenant, records).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.is_completed() {
        Ok(())
    } else {
        Err(CliError::SyncFailed {
            failed: 1,
            total: 1,
        })
    }
}

async fn read_input(file: Option<&PathBuf>) -> CliResult<String> {
    match file {
        Some(path) if path.as_os_str() != "-" => {
            debug!(path = %path.display(), "Reading webhook payload");
            Ok(tokio::fs::read_to_string(path).await?)
        }
        _ => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            Ok(raw)
        }
    }
}

/// Normalize every payload in `raw`. One bad payload rejects the whole input.
fn parse_events(raw: &str, kind: Option<WebhookKind>) -> CliResult<Vec<WebhookEvent>> {
    let body: Value = serde_json::from_str(raw)?;
    let payloads = match body {
        Value::Array(items) => items,
        single => vec![single],
    };
    if payloads.is_empty() {
        return Err(CliError::Validation("no webhook payloads in input".to_string()));
    }

    let observed_at = Utc::now();
    let endpoint_kind = kind.map(RecordKind::from);
    payloads
        .iter()
        .map(|payload| normalize_webhook(payload, endpoint_kind, observed_at).map_err(CliError::from))
        .collect()
}

/// Tenant whose OpenPhone connection owns the events' phone number.
fn route_tenant(connections: &[ProviderConnection], events: &[WebhookEvent]) -> CliResult<TenantId> {
    let mut numbers = events.iter().filter_map(|e| e.phone_number_id.as_deref());
    let Some(number) = numbers.next() else {
        return Err(CliError::Validation(
            "payload has no phone number ID; pass --tenant".to_string(),
        ));
    };
    if numbers.any(|other| other != number) {
        return Err(CliError::Validation(
            "payloads span several phone numbers; ingest them separately".to_string(),
        ));
    }

    connections
        .iter()
        .find(|c| c.external_account_ref == number)
        .map(|c| c.tenant_id)
        .ok_or_else(|| CliError::NotFound(format!("no OpenPhone connection for {number}")))
}
