//! # syncline Database Layer
//!
//! PostgreSQL persistence for the sync engine: provider connections, their
//! credentials and the entities reconciled from provider data.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use syncline_db::PgSyncStore;
//!
//! let store = Arc::new(PgSyncStore::connect(&database_url).await?);
//! let orchestrator = SyncOrchestrator::new(store, fetcher, SyncConfig::default())?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
mod rows;
pub mod store;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
pub use store::PgSyncStore;
