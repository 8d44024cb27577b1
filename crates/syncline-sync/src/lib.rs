//! # syncline Sync Engine
//!
//! Multi-tenant synchronization of third-party provider data into local
//! entities.
//!
//! A run for one tenant goes:
//!
//! 1. [`TokenStore`] loads the connection's credential.
//! 2. If it has expired, a [`TokenRefresher`] exchanges the refresh token (never retried).
//! 3. A [`RemoteFetcher`] pages through provider data as [`RemoteRecord`]s.
//! 4. [`UpsertReconciler`] merges them into entities by natural key and
//!    commits the tenant's batch atomically.
//!
//! [`SyncOrchestrator`] sequences the phases, enforces the per-tenant deadline
//! and fans out over tenants with a bounded pool. Callers get a
//! [`TenantOutcome`] per tenant, never an error.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use syncline_sync::{InMemoryStore, SyncConfig, SyncOrchestrator};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let orchestrator = SyncOrchestrator::new(store, fetcher, SyncConfig::default())?;
//!
//! let batch = orchestrator.run_for_all_tenants().await;
//! if let Some(reason) = &batch.listing_error {
//!     eprintln!("could not list tenants: {reason}");
//! }
//! for (tenant, outcome) in &batch.outcomes {
//!     println!("{tenant}: {:?}", outcome.failure_reason());
//! }
//! ```

pub mod config;
pub mod credential;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod http;
pub mod memory;
pub mod merge;
pub mod orchestrator;
pub mod reconcile;
pub mod record;
pub mod refresh;
pub mod report;
pub mod result;
pub mod retry;
pub mod run_state;
pub mod score;
pub mod store;
pub mod token_store;
pub mod validation;

pub use config::{ConfigError, SyncConfig};
pub use credential::{OAuthCredential, ProviderConnection};
pub use entity::{
    CallLog, EntityKind, Lead, LocalEntity, MessageLog, MetricSummary, MetricsBlob, NaturalKey,
    ReviewSummary,
};
pub use error::{RefreshError, Result, StoreError, StoreResult, SyncError, TransportError};
pub use fetch::{PageFailure, RecordPages, RemoteFetcher, StaticPages};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use memory::InMemoryStore;
pub use merge::MergePolicy;
pub use orchestrator::SyncOrchestrator;
pub use reconcile::{ReconcileTally, UpsertReconciler};
pub use record::{RecordKind, RemoteRecord};
pub use refresh::{OAuthClient, OAuthRefresher, TokenRefresher};
pub use report::{RunReporter, TracingReporter};
pub use result::{BatchOutcome, FailureReason, RecordError, SyncResult, TenantOutcome};
pub use retry::{RetryConfig, RetryingTransport};
pub use run_state::{RunPhase, RunState};
pub use score::{InsightScorer, TieredVisibilityScorer};
pub use store::{EntityBatch, SyncStore};
pub use token_store::TokenStore;
