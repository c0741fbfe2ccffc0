//! # Repository Module
//!
//! Database repository implementations for shopdesk.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Handler                                                                │
//! │       │  db.invoices().add_payment(&actor, id, payment)                 │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                      │
//! │  ├── reads:  scoped_query(.., &actor.scope()?, "tenant_id")             │
//! │  └── writes: BEGIN IMMEDIATE ─► load ─► check rule ─► write ─► COMMIT   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! │                                                                         │
//! │  Business rules that depend on current rows (stock, balances,          │
//! │  lifecycle) are checked inside the transaction that writes.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - Shop admins, cashiers and actor resolution
//! - [`supplier::SupplierRepository`] - Supplier directory
//! - [`product::ProductRepository`] - Catalogue, stock and the movement log
//! - [`customer::CustomerRepository`] - Customers and credit position
//! - [`sale::SaleRepository`] - Sale processing and deletion
//! - [`debt::DebtRepository`] - Debts and the debt payment ledger
//! - [`invoice::InvoiceRepository`] - Invoices, items and the payment ledger
//! - [`storefront::StorefrontRepository`] - Web shop, carts and orders
//! - [`report::ReportRepository`] - Revenue and dashboards

pub mod customer;
pub mod debt;
pub mod invoice;
pub mod product;
pub mod report;
pub mod sale;
pub mod storefront;
pub mod supplier;
pub mod user;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

/// Opens a transaction that takes SQLite's write lock up front.
///
/// Write paths read before they write. A deferred `BEGIN` would have to
/// upgrade its read lock mid-transaction, and in WAL mode that upgrade
/// fails with `SQLITE_BUSY` without waiting on `busy_timeout`. Taking the
/// lock at `BEGIN` makes concurrent writers queue instead.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
