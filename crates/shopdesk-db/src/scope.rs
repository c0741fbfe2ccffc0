//! # Tenant Filter
//!
//! The one place where a caller's [`TenantScope`] becomes SQL.
//!
//! ## How Reads Are Scoped
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  scoped_query("SELECT ... FROM invoices", &scope, "tenant_id")          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT ... FROM invoices WHERE 1 = 1                                   │
//! │       │                                                                 │
//! │       ├── TenantScope::All          → (nothing appended)                │
//! │       └── TenantScope::Tenant(id)   → AND tenant_id = ?   [bind id]     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  caller appends its own predicates: AND id = ?, AND date(...) >= ?     │
//! │                                                                         │
//! │  A row outside the scope is simply absent: lookups by id come back     │
//! │  as NotFound, never as "forbidden".                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{QueryBuilder, Sqlite};

use shopdesk_core::{Actor, TenantScope};

/// Scoping predicates for [`QueryBuilder`].
pub trait TenantFilter {
    /// Appends ` AND {column} = ?` unless the scope is `All`.
    fn push_tenant_filter(&mut self, scope: &TenantScope, column: &str) -> &mut Self;

    /// Appends ` AND {column} = ?` bound to the actor's user id when the
    /// actor may only see rows they created (cashiers and their sales).
    fn push_own_rows_filter(&mut self, actor: &Actor, column: &str) -> &mut Self;
}

impl<'args> TenantFilter for QueryBuilder<'args, Sqlite> {
    fn push_tenant_filter(&mut self, scope: &TenantScope, column: &str) -> &mut Self {
        if let TenantScope::Tenant(tenant_id) = scope {
            self.push(" AND ");
            self.push(column);
            self.push(" = ");
            self.push_bind(tenant_id.clone());
        }
        self
    }

    fn push_own_rows_filter(&mut self, actor: &Actor, column: &str) -> &mut Self {
        if actor.sees_own_sales_only() {
            self.push(" AND ");
            self.push(column);
            self.push(" = ");
            self.push_bind(actor.user_id.clone());
        }
        self
    }
}

/// Starts a query with `WHERE 1 = 1` and the tenant predicate applied.
///
/// `select` must not contain a WHERE clause; callers add theirs with
/// ` AND ...`.
pub fn scoped_query<'args>(select: &str, scope: &TenantScope, column: &str) -> QueryBuilder<'args, Sqlite> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" WHERE 1 = 1");
    qb.push_tenant_filter(scope, column);
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdesk_core::Role;

    #[test]
    fn test_all_scope_adds_nothing() {
        let qb = scoped_query("SELECT id FROM products", &TenantScope::All, "tenant_id");
        assert_eq!(qb.sql(), "SELECT id FROM products WHERE 1 = 1");
    }

    #[test]
    fn test_tenant_scope_binds_tenant() {
        let qb = scoped_query(
            "SELECT id FROM products",
            &TenantScope::Tenant("t1".into()),
            "p.tenant_id",
        );
        assert_eq!(qb.sql(), "SELECT id FROM products WHERE 1 = 1 AND p.tenant_id = ?");
    }

    #[test]
    fn test_own_rows_only_for_cashiers() {
        let cashier = Actor::new("c1", "till", Role::Cashier, Some("t1".into()));
        let admin = Actor::new("t1", "shop", Role::ShopAdmin, None);

        let mut qb = scoped_query("SELECT id FROM sales", &TenantScope::Tenant("t1".into()), "tenant_id");
        qb.push_own_rows_filter(&cashier, "created_by");
        assert!(qb.sql().ends_with("AND created_by = ?"));

        let mut qb = scoped_query("SELECT id FROM sales", &TenantScope::Tenant("t1".into()), "tenant_id");
        qb.push_own_rows_filter(&admin, "created_by");
        assert!(!qb.sql().contains("created_by"));
    }
}
