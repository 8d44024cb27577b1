//! syncline Core Library
//!
//! Shared types for the syncline synchronization engine and its connectors.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (TenantId, ConnectionId, EntityId)
//! - [`provider`] - Third-party providers and how they authenticate
//! - [`clock`] - Injectable time source
//! - [`traits`] - Multi-tenant traits (TenantAware)
//!
//! # Example
//!
//! ```
//! use syncline_core::{AuthMode, Provider, TenantId};
//!
//! let tenant_id = TenantId::new();
//! let provider: Provider = "google_gbp".parse().unwrap();
//!
//! assert_eq!(provider.auth_mode(), AuthMode::OAuth);
//! println!("syncing {provider} for {tenant_id}");
//! ```

pub mod clock;
pub mod ids;
pub mod provider;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{ConnectionId, EntityId, ParseIdError, TenantId};
pub use provider::{AuthMode, ParseProviderError, Provider};
pub use traits::TenantAware;
