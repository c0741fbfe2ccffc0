//! # Tenancy and Roles
//!
//! Resolves what a caller may see ([`TenantScope`]) and do ([`Permission`]).
//!
//! ## Tenant Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   SiteAdmin ───────────────► TenantScope::All   (union of all shops)    │
//! │                                                                         │
//! │   ShopAdmin (id = A) ──────► TenantScope::Tenant(A)                     │
//! │        ▲                                                                │
//! │        │ shop_admin_id                                                  │
//! │   Cashier ─────────────────► TenantScope::Tenant(A)                     │
//! │                              + only sales they created                  │
//! │                                                                         │
//! │   A tenant IS a shop admin: every product, customer, sale, debt,       │
//! │   invoice and storefront row carries tenant_id = shop admin's user id  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database layer turns a `TenantScope` into a SQL predicate in exactly
//! one place (`shopdesk_db::scope`); nothing else decides visibility.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Role
// =============================================================================

/// A user's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    /// Platform operator; sees every tenant.
    SiteAdmin,
    /// Owner of a shop; is the tenant.
    ShopAdmin,
    /// Works the till for exactly one shop admin.
    Cashier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SiteAdmin => "site_admin",
            Role::ShopAdmin => "shop_admin",
            Role::Cashier => "cashier",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tenant Scope
// =============================================================================

/// The set of tenants a caller can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    /// Every tenant (site admins only).
    All,
    /// Exactly one tenant.
    Tenant(String),
}

impl TenantScope {
    /// Returns true if a record owned by `tenant_id` is visible.
    pub fn includes(&self, tenant_id: &str) -> bool {
        match self {
            TenantScope::All => true,
            TenantScope::Tenant(id) => id == tenant_id,
        }
    }

    /// Returns the single tenant id, if the scope is restricted.
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            TenantScope::All => None,
            TenantScope::Tenant(id) => Some(id),
        }
    }
}

// =============================================================================
// Permissions
// =============================================================================

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageProducts,
    ManageSuppliers,
    AdjustStock,
    ManageStorefront,
    ManageCashiers,
    ManageShopAdmins,
    CreateSales,
    DeleteSales,
    ViewReports,
    ManageInvoices,
}

impl Permission {
    fn describe(&self) -> &'static str {
        match self {
            Permission::ManageProducts => "manage products",
            Permission::ManageSuppliers => "manage suppliers",
            Permission::AdjustStock => "adjust stock",
            Permission::ManageStorefront => "manage the storefront",
            Permission::ManageCashiers => "manage cashiers",
            Permission::ManageShopAdmins => "manage shop administrators",
            Permission::CreateSales => "create sales",
            Permission::DeleteSales => "delete sales",
            Permission::ViewReports => "view reports",
            Permission::ManageInvoices => "manage invoices",
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

/// The authenticated caller of an operation.
///
/// Built by the API layer from a verified token plus the users table, so
/// `tenant_id` always reflects the current assignment, not whatever was
/// true when the token was minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    /// Shop admin id this actor works for; None for site admins and for
    /// cashiers that have not been assigned.
    pub tenant_id: Option<String>,
}

impl Actor {
    /// Builds an actor from a user's role and shop assignment.
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        role: Role,
        shop_admin_id: Option<String>,
    ) -> Self {
        let user_id = user_id.into();
        let tenant_id = match role {
            Role::SiteAdmin => None,
            Role::ShopAdmin => Some(user_id.clone()),
            Role::Cashier => shop_admin_id,
        };
        Actor {
            user_id,
            username: username.into(),
            role,
            tenant_id,
        }
    }

    #[inline]
    pub fn is_site_admin(&self) -> bool {
        self.role == Role::SiteAdmin
    }

    #[inline]
    pub fn is_shop_admin(&self) -> bool {
        self.role == Role::ShopAdmin
    }

    #[inline]
    pub fn is_cashier(&self) -> bool {
        self.role == Role::Cashier
    }

    /// Returns the read scope for this actor.
    ///
    /// ## Errors
    /// `TenantRequired` for a cashier with no shop admin; such a cashier
    /// must not fall through to an unfiltered query.
    pub fn scope(&self) -> CoreResult<TenantScope> {
        match (self.role, &self.tenant_id) {
            (Role::SiteAdmin, _) => Ok(TenantScope::All),
            (_, Some(tenant)) => Ok(TenantScope::Tenant(tenant.clone())),
            (_, None) => Err(CoreError::TenantRequired {
                reason: format!("user {} is not assigned to a shop", self.username),
            }),
        }
    }

    /// Cashiers only see sales they rang up themselves.
    pub fn sees_own_sales_only(&self) -> bool {
        self.is_cashier()
    }

    /// Returns true if the role grants `permission`.
    pub fn has(&self, permission: Permission) -> bool {
        match permission {
            Permission::CreateSales | Permission::ManageInvoices => true,
            Permission::ManageShopAdmins => self.is_site_admin(),
            Permission::ManageProducts
            | Permission::ManageSuppliers
            | Permission::AdjustStock
            | Permission::ManageStorefront
            | Permission::ManageCashiers
            | Permission::DeleteSales
            | Permission::ViewReports => self.is_site_admin() || self.is_shop_admin(),
        }
    }

    /// Fails with `PermissionDenied` unless the role grants `permission`.
    pub fn require(&self, permission: Permission) -> CoreResult<()> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(CoreError::denied(permission.describe()))
        }
    }

    /// Returns true if this actor may touch records owned by `tenant_id`.
    pub fn can_access(&self, tenant_id: &str) -> bool {
        self.is_site_admin() || self.tenant_id.as_deref() == Some(tenant_id)
    }

    /// Resolves the tenant a new record is written under.
    ///
    /// ```text
    /// SiteAdmin  + Some(t) → t
    /// SiteAdmin  + None    → TenantRequired
    /// other      + None    → own tenant
    /// other      + Some(t) → t if t == own tenant, else PermissionDenied
    /// ```
    pub fn write_tenant(&self, requested: Option<&str>) -> CoreResult<String> {
        if self.is_site_admin() {
            return requested.map(str::to_string).ok_or_else(|| CoreError::TenantRequired {
                reason: "site administrators must name the shop the record belongs to".to_string(),
            });
        }

        let own = self.tenant_id.as_deref().ok_or_else(|| CoreError::TenantRequired {
            reason: format!("user {} is not assigned to a shop", self.username),
        })?;

        match requested {
            Some(t) if t != own => Err(CoreError::denied("write records for another shop")),
            _ => Ok(own.to_string()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
