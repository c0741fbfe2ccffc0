//! # shopdesk-core: Pure Business Logic for shopdesk
//!
//! Money math, derived statuses, tenant scoping and validation for a
//! multitenant point-of-sale, invoicing and storefront service. Nothing in
//! this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        shopdesk Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    bearer token ──► Actor ──► handler ──► JSON                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ shopdesk-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  tenant  │ │  money   │ │ invoice  │ │   sale   │          │   │
//! │  │   │  Actor   │ │  Money   │ │  status  │ │  totals  │          │   │
//! │  │   │  Scope   │ │  Percent │ │  totals  │ │  settle  │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │   debt   │ │storefront│ │numbering │ │validation│          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  shopdesk-db (Database Layer)                   │   │
//! │  │     SQLite, migrations, tenant filter, transactional writes     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`tenant`] - Roles, the resolved [`Actor`], [`TenantScope`] and permissions
//! - [`money`] - Integer cents and basis-point rates
//! - [`types`] - Products, stock movements, suppliers, customers, users
//! - [`sale`] - Sales, line merging, totals and cash settlement
//! - [`debt`] - Debts and their derived status
//! - [`invoice`] - Invoices, line totals, derived status and dashboard
//! - [`storefront`] - Web shop profile, catalogue, carts and orders
//! - [`report`] - Revenue aggregates
//! - [`numbering`] - Document number formats
//! - [`validation`] - Field rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use shopdesk_core::invoice::{InvoiceLifecycle, InvoiceStatus};
//! use shopdesk_core::Money;
//!
//! let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
//! let due = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
//!
//! let status = InvoiceStatus::derive(
//!     InvoiceLifecycle::Sent,
//!     Money::from_cents(10_000),
//!     Money::from_cents(2_500),
//!     due,
//!     today,
//! );
//! assert_eq!(status, InvoiceStatus::Overdue);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod debt;
pub mod error;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod report;
pub mod sale;
pub mod storefront;
pub mod tenant;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use tenant::{Actor, Permission, Role, TenantScope};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days a credit sale's debt stays open before it is overdue.
pub const DEFAULT_CREDIT_TERM_DAYS: i64 = 30;

/// Maximum distinct lines in one sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single sale line.
///
/// ## Business Reason
/// Catches typing 1000 instead of 10 at the till.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Reorder threshold given to new stock rows.
pub const DEFAULT_REORDER_LEVEL: i64 = 10;

/// Capacity given to new stock rows.
pub const DEFAULT_MAX_STOCK: i64 = 1000;

// =============================================================================
// Business Rules
// =============================================================================

/// Tunable limits applied by the sale and storefront paths.
///
/// Loaded from the `[business]` section of the service config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BusinessRules {
    /// Days until a credit sale's debt falls due.
    pub credit_term_days: i64,
    /// Flat fee added to every storefront order, in cents.
    pub storefront_delivery_fee_cents: i64,
    pub max_sale_lines: usize,
    pub max_line_quantity: i64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        BusinessRules {
            credit_term_days: DEFAULT_CREDIT_TERM_DAYS,
            storefront_delivery_fee_cents: 0,
            max_sale_lines: MAX_SALE_LINES,
            max_line_quantity: MAX_LINE_QUANTITY,
        }
    }
}
