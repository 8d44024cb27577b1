//! Multi-Tenant Traits
//!
//! Everything the sync engine stores is scoped to a tenant. Types that carry
//! a tenant implement [`TenantAware`] so stores and reconcilers can check
//! scoping generically.
//!
//! # Example
//!
//! ```
//! use syncline_core::{TenantAware, TenantId};
//!
//! struct Connection {
//!     tenant_id: TenantId,
//!     external_account_ref: String,
//! }
//!
//! impl TenantAware for Connection {
//!     fn tenant_id(&self) -> TenantId {
//!         self.tenant_id
//!     }
//! }
//!
//! let tenant = TenantId::new();
//! let conn = Connection {
//!     tenant_id: tenant,
//!     external_account_ref: "accounts/1/locations/2".to_string(),
//! };
//!
//! assert!(conn.belongs_to(tenant));
//! ```

use crate::ids::TenantId;

/// Trait for values that belong to exactly one tenant.
///
/// Object-safe: usable as `&dyn TenantAware`.
pub trait TenantAware {
    /// Returns the owning tenant.
    fn tenant_id(&self) -> TenantId;

    /// True when the value is scoped to `tenant`.
    fn belongs_to(&self, tenant: TenantId) -> bool {
        self.tenant_id() == tenant
    }
}

impl<T: TenantAware + ?Sized> TenantAware for &T {
    fn tenant_id(&self) -> TenantId {
        (**self).tenant_id()
    }
}

impl<T: TenantAware + ?Sized> TenantAware for Box<T> {
    fn tenant_id(&self) -> TenantId {
        (**self).tenant_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scoped {
        tenant_id: TenantId,
    }

    impl TenantAware for Scoped {
        fn tenant_id(&self) -> TenantId {
            self.tenant_id
        }
    }

    #[test]
    fn test_belongs_to_matches_owner_only() {
        let owner = TenantId::new();
        let scoped = Scoped { tenant_id: owner };

        assert!(scoped.belongs_to(owner));
        assert!(!scoped.belongs_to(TenantId::new()));
    }

    #[test]
    fn test_trait_object_and_box() {
        let owner = TenantId::new();
        let boxed: Box<dyn TenantAware> = Box::new(Scoped { tenant_id: owner });
        assert_eq!(boxed.tenant_id(), owner);

        let by_ref: &dyn TenantAware = &*boxed;
        assert!(by_ref.belongs_to(owner));
    }

    #[test]
    fn test_filtering_by_tenant() {
        let a = TenantId::new();
        let b = TenantId::new();
        let items = [
            Scoped { tenant_id: a },
            Scoped { tenant_id: b },
            Scoped { tenant_id: a },
        ];

        let count = items.iter().filter(|s| s.belongs_to(a)).count();
        assert_eq!(count, 2);
    }
}
