//! # shopdesk-db: Database Layer for shopdesk
//!
//! SQLite storage for the shopdesk service, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        shopdesk Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                         │
//! │       │  Actor resolved from the bearer token                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   shopdesk-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │   │
//! │  │   │   (pool.rs)   │    │  user, sale,  │    │  (embedded)  │    │   │
//! │  │   │               │◄───│  invoice, ... │    │  001..004    │    │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘    │   │
//! │  │                                │                                │   │
//! │  │                        ┌───────▼───────┐                        │   │
//! │  │                        │   scope.rs    │  the only place a      │   │
//! │  │                        │ TenantFilter  │  tenant predicate is   │   │
//! │  │                        └───────────────┘  written               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`scope`] - Tenant filtering for every read
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopdesk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("shopdesk.db")).await?;
//!
//! let actor = db.users().actor_for(&user_id).await?.ok_or(...)?;
//! let products = db.products().list(&actor.scope()?, Some("coke"), false).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod scope;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, DbLocation};

// Repository re-exports for convenience
pub use repository::customer::{CustomerRepository, CustomerUpdate, NewCustomer};
pub use repository::debt::{DebtFilter, DebtRepository, NewDebtPayment};
pub use repository::invoice::{
    InvoiceFilter, InvoiceRepository, InvoiceUpdate, NewInvoice, NewInvoiceItem, NewInvoicePayment,
};
pub use repository::product::{NewProduct, ProductRepository, ProductUpdate, StockAdjustmentRequest};
pub use repository::report::ReportRepository;
pub use repository::sale::{NewSale, SaleFilter, SaleRepository};
pub use repository::storefront::{NewShopProduct, ShopProductUpdate, StorefrontRepository, StorefrontSetup};
pub use repository::supplier::{NewSupplier, SupplierRepository};
pub use repository::user::{NewUser, UserRepository};

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures: an in-memory database with two shops.

    use chrono::{NaiveDate, Utc};
    use shopdesk_core::{Actor, Product};

    use crate::{Database, DbConfig, NewProduct, NewUser};

    pub struct Fixture {
        pub db: Database,
        pub site: Actor,
        pub shop: Actor,
        pub cashier: Actor,
        pub other_shop: Actor,
    }

    fn new_user(username: &str, shop_admin_id: Option<&str>) -> NewUser {
        NewUser {
            username: username.to_string(),
            full_name: format!("{} user", username),
            shop_name: None,
            shop_admin_id: shop_admin_id.map(str::to_string),
        }
    }

    /// Site admin, shop admin `corner` with cashier `till1`, and shop admin `market`.
    pub async fn fixture() -> Fixture {
        fixture_with(DbConfig::in_memory()).await
    }

    /// Same users as [`fixture`] on a caller-chosen database.
    pub async fn fixture_with(config: DbConfig) -> Fixture {
        let db = Database::new(config).await.unwrap();
        let users = db.users();

        let site = users.create_site_admin(new_user("root", None)).await.unwrap();
        let site = users.actor_for(&site.id).await.unwrap().unwrap();

        let shop = users.create_shop_admin(&site, new_user("corner", None)).await.unwrap();
        let shop = users.actor_for(&shop.id).await.unwrap().unwrap();

        let other = users.create_shop_admin(&site, new_user("market", None)).await.unwrap();
        let other_shop = users.actor_for(&other.id).await.unwrap().unwrap();

        let cashier = users.create_cashier(&shop, new_user("till1", None)).await.unwrap();
        let cashier = users.actor_for(&cashier.id).await.unwrap().unwrap();

        Fixture {
            db,
            site,
            shop,
            cashier,
            other_shop,
        }
    }

    /// Creates a product with the given stock and prices for `actor`'s shop.
    pub async fn product(db: &Database, actor: &Actor, sku: &str, quantity: i64, price_cents: i64) -> Product {
        db.products()
            .create(
                actor,
                NewProduct {
                    tenant_id: None,
                    sku: sku.to_string(),
                    barcode: None,
                    name: format!("Product {}", sku),
                    description: None,
                    category: None,
                    cost_price_cents: price_cents / 2,
                    selling_price_cents: price_cents,
                    initial_quantity: quantity,
                    reorder_level: None,
                    max_stock: None,
                    location: None,
                },
            )
            .await
            .unwrap()
    }

    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }
}
