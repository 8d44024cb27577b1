//! `syncline connections`: list and link provider connections.

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use syncline_core::{AuthMode, Provider, TenantId};
use syncline_db::PgSyncStore;
use syncline_sync::{OAuthCredential, ProviderConnection, SyncStore};
use uuid::Uuid;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{connection_row, print_info, print_key_value, print_success, print_warning};

/// Connection management commands
#[derive(Args, Debug)]
pub struct ConnectionsArgs {
    #[command(subcommand)]
    pub command: ConnectionsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConnectionsCommands {
    /// List linked provider connections
    List(ListArgs),
    /// Link a provider for a tenant, replacing any existing link
    Add(AddArgs),
}

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list connections for this provider
    #[arg(long, short = 'p')]
    pub provider: Option<Provider>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the add command
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Tenant ID (UUID)
    #[arg(long, short = 't')]
    pub tenant: Uuid,

    #[arg(long, short = 'p')]
    pub provider: Provider,

    /// Location path, phone number ID, sheet URL or campaign ID
    #[arg(long)]
    pub account: String,

    /// OAuth access token or API key
    #[arg(long, env = "SYNCLINE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// OAuth refresh token
    #[arg(long, env = "SYNCLINE_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Seconds until the access token expires
    #[arg(long)]
    pub expires_in: Option<i64>,
}

/// Execute connection commands
pub async fn execute(args: ConnectionsArgs, config: &CliConfig) -> CliResult<()> {
    let store = PgSyncStore::connect(&config.database_url).await?;
    match args.command {
        ConnectionsCommands::List(list_args) => execute_list(list_args, &store).await,
        ConnectionsCommands::Add(add_args) => execute_add(add_args, &store).await,
    }
}

async fn execute_list(args: ListArgs, store: &PgSyncStore) -> CliResult<()> {
    let connections = match args.provider {
        Some(provider) => store.list_connections(provider).await?,
        None => store.all_connections().await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&connections)?);
        return Ok(());
    }

    if connections.is_empty() {
        print_info("No provider connections found.");
        return Ok(());
    }
    println!("TENANT\tPROVIDER\tACCOUNT\tLAST SYNCED");
    for connection in &connections {
        println!("{}", connection_row(connection));
    }
    Ok(())
}

async fn execute_add(args: AddArgs, store: &PgSyncStore) -> CliResult<()> {
    let tenant = TenantId::from_uuid(args.tenant);
    let provider = args.provider;
    let now = Utc::now();

    let connection = ProviderConnection::new(tenant, provider, args.account.trim(), now);
    let credential = credential_for(&args, &connection, now)?;

    store.save_connection(&connection).await?;
    if let Some(credential) = &credential {
        store.save_credential(tenant, provider, credential).await?;
    }

    print_success(&format!("Linked {provider} for tenant {tenant}"));
    print_key_value("Connection", &connection.id.to_string());
    print_key_value("Account", &connection.external_account_ref);
    if provider.auth_mode() == AuthMode::OAuth
        && credential.as_ref().is_some_and(|c| c.refresh_token.is_none())
    {
        print_warning("No refresh token stored; syncs will fail once the access token expires.");
    }
    Ok(())
}

/// Credential to store alongside a new connection, if the provider uses one.
fn credential_for(
    args: &AddArgs,
    connection: &ProviderConnection,
    now: DateTime<Utc>,
) -> CliResult<Option<OAuthCredential>> {
    if connection.external_account_ref.is_empty() {
        return Err(CliError::Validation("--account must not be empty".to_string()));
    }

    match connection.provider.auth_mode() {
        AuthMode::Public => {
            if args.access_token.is_some() || args.refresh_token.is_some() {
                return Err(CliError::Validation(format!(
                    "{} does not use credentials",
                    connection.provider
                )));
            }
            Ok(None)
        }
        AuthMode::ApiKey => {
            let key = required_token(args, connection.provider)?;
            Ok(Some(OAuthCredential::api_key(connection.id, key)))
        }
        AuthMode::OAuth => {
            let token = required_token(args, connection.provider)?;
            let mut credential = OAuthCredential::api_key(connection.id, token);
            credential.refresh_token = args.refresh_token.clone();
            credential.expires_at = match args.expires_in {
                None => None,
                Some(secs) => Some(
                    Duration::try_seconds(secs)
                        .and_then(|lifetime| now.checked_add_signed(lifetime))
                        .ok_or_else(|| {
                            CliError::Validation(format!("--expires-in {secs} is out of range"))
                        })?,
                ),
            };
            Ok(Some(credential))
        }
    }
}

fn required_token(args: &AddArgs, provider: Provider) -> CliResult<String> {
    args.access_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CliError::Validation(format!("{provider} requires --access-token")))
}
