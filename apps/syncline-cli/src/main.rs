//! syncline CLI - manual trigger for provider syncs
//!
//! This CLI lets operators:
//! - Run a provider sync for one tenant or every connected tenant
//! - List and link provider connections
//! - Apply OpenPhone webhook payloads captured outside the web tier

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod engine;
mod error;
mod logging;
mod output;

use config::CliConfig;
use error::{CliError, CliResult};

/// syncline CLI - Multi-tenant provider sync
#[derive(Parser)]
#[command(name = "syncline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync provider data into the local store
    Sync(commands::sync::SyncArgs),

    /// Manage provider connections
    Connections(commands::connections::ConnectionsArgs),

    /// Ingest OpenPhone webhook payloads
    Ingest(commands::ingest::IngestArgs),
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = CliConfig::from_env().map_err(CliError::from)?;
    logging::init_logging(&config.log_filter, config.log_json);

    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, &config).await,
        Commands::Connections(args) => commands::connections::execute(args, &config).await,
        Commands::Ingest(args) => commands::ingest::execute(args, &config).await,
    }
}
