//! Google Business Profile connector for syncline
//!
//! Pulls daily insight reports and reviews for a linked location and hands
//! them to the sync engine as `metric` and `review` records, which reconcile
//! into the tenant's single metrics blob.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use syncline_connector_gbp::{GbpConfig, GbpFetcher};
//! use syncline_sync::{InMemoryStore, ReqwestTransport, SyncConfig, SyncOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GbpConfig::from_env()?;
//! let transport = Arc::new(ReqwestTransport::default());
//! let refresher = Arc::new(config.refresher(transport.clone()));
//! let fetcher = Arc::new(GbpFetcher::new(transport, config));
//!
//! let orchestrator = SyncOrchestrator::new(Arc::new(InMemoryStore::new()), fetcher, SyncConfig::default())?
//!     .with_refresher(refresher);
//! let batch = orchestrator.run_for_all_tenants().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod fetcher;
mod insights;
mod location;
mod reviews;

pub use config::{GbpConfig, DEFAULT_API_BASE, DEFAULT_METRICS, DEFAULT_TOKEN_URL};
pub use fetcher::GbpFetcher;
pub use insights::{report_request, ReportWindow};
pub use location::LocationRef;
pub use reviews::parse_star_rating;
