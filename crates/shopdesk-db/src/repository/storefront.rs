//! # Storefront Repository
//!
//! The public web shop of each tenant: profile, web catalogue, anonymous
//! carts, checkout and order management.
//!
//! ## Access
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  management (Actor, ManageStorefront)    public (slug, no login)       │
//! │  ───────────────────────────────────     ──────────────────────────    │
//! │  setup / update_profile                  public_products               │
//! │  create / update / retire product        create_cart / cart            │
//! │  list_orders / order                     add / update / remove item    │
//! │  update_order_status                     checkout                      │
//! │  update_payment_status                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Public calls resolve the shop by slug and only see shops whose website
//! is active. Every cart and product lookup is then pinned to that shop's
//! tenant.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shopdesk_core::numbering::order_number;
use shopdesk_core::storefront::{
    ensure_cart_quantity, CartLine, CartView, CheckoutDetails, ListedProduct, Order, OrderDetail, OrderItem,
    OrderStatus, PaymentStatus, ShopProduct, ShopProfile, ShopTheme,
};
use shopdesk_core::validation::{
    normalize_optional, validate_amount_cents, validate_email, validate_name, validate_stock_level,
};
use shopdesk_core::{Actor, BusinessRules, CoreError, Money, Permission, TenantScope, ValidationError};

use crate::error::{on_duplicate, DbError, DbResult, OrNotFound};
use crate::repository::begin_write;
use crate::scope::scoped_query;

const PROFILE_COLUMNS: &str = "SELECT id, tenant_id, slug, business_name, description, email, phone, address, city, \
     theme, is_website_active, created_at, updated_at FROM shop_profiles";

const SHOP_PRODUCT_COLUMNS: &str = "SELECT id, tenant_id, name, description, category, price_cents, \
     original_price_cents, is_featured, is_available, stock_quantity, is_active, created_at, updated_at \
     FROM shop_products";

const ORDER_COLUMNS: &str = "SELECT id, tenant_id, order_number, customer_name, customer_email, customer_phone, \
     delivery_address, notes, order_status, payment_status, subtotal_cents, delivery_fee_cents, total_amount_cents, \
     signed_at, created_at, updated_at FROM orders";

// =============================================================================
// Request Types
// =============================================================================

/// Profile fields for setting up or replacing a shop page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontSetup {
    /// Shop the page belongs to; site admins must set it.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub business_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub theme: ShopTheme,
    #[serde(default = "default_true")]
    pub is_website_active: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StorefrontSetup {
    fn default() -> Self {
        StorefrontSetup {
            tenant_id: None,
            business_name: String::new(),
            description: None,
            email: None,
            phone: None,
            address: None,
            city: None,
            theme: ShopTheme::default(),
            is_website_active: true,
        }
    }
}

impl StorefrontSetup {
    fn validate(&self) -> DbResult<()> {
        validate_name("business_name", &self.business_name)?;
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email("email", email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewShopProduct {
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub original_price_cents: Option<i64>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub stock_quantity: i64,
}

/// Partial web product update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub original_price_cents: Option<i64>,
    pub is_featured: Option<bool>,
    pub is_available: Option<bool>,
    pub stock_quantity: Option<i64>,
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Active shop page by slug; hidden shops read as missing.
async fn shop_by_slug(conn: &mut SqliteConnection, slug: &str) -> DbResult<ShopProfile> {
    sqlx::query_as::<_, ShopProfile>(&format!("{} WHERE slug = ? AND is_website_active = 1", PROFILE_COLUMNS))
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
        .or_not_found("Shop", slug)
}

/// Rows of the shop behind a public page.
fn shop_scope(shop: &ShopProfile) -> TenantScope {
    TenantScope::Tenant(shop.tenant_id.clone())
}

async fn profile_for(conn: &mut SqliteConnection, tenant_id: &str) -> DbResult<Option<ShopProfile>> {
    let scope = TenantScope::Tenant(tenant_id.to_string());
    let profile = scoped_query(PROFILE_COLUMNS, &scope, "tenant_id")
        .build_query_as::<ShopProfile>()
        .fetch_optional(&mut *conn)
        .await?;
    Ok(profile)
}

async fn find_shop_product(conn: &mut SqliteConnection, scope: &TenantScope, id: &str) -> DbResult<Option<ShopProduct>> {
    let mut qb = scoped_query(SHOP_PRODUCT_COLUMNS, scope, "tenant_id");
    qb.push(" AND id = ");
    qb.push_bind(id.to_string());

    let product = qb.build_query_as::<ShopProduct>().fetch_optional(&mut *conn).await?;
    Ok(product)
}

/// Cart id pinned to the shop's tenant.
async fn ensure_cart(conn: &mut SqliteConnection, shop: &ShopProfile, cart_id: &str) -> DbResult<()> {
    let mut qb = scoped_query("SELECT id FROM carts", &shop_scope(shop), "tenant_id");
    qb.push(" AND id = ");
    qb.push_bind(cart_id.to_string());

    let exists: Option<String> = qb.build_query_scalar::<String>().fetch_optional(&mut *conn).await?;
    exists.map(|_| ()).or_not_found("Cart", cart_id)
}

async fn cart_lines(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
        "SELECT ci.product_id, p.name, p.price_cents AS unit_price_cents, ci.quantity, p.stock_quantity \
         FROM cart_items ci JOIN shop_products p ON p.id = ci.product_id \
         WHERE ci.cart_id = ? ORDER BY ci.added_at, ci.rowid",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

async fn cart_quantity(conn: &mut SqliteConnection, cart_id: &str, product_id: &str) -> DbResult<Option<i64>> {
    let quantity = sqlx::query_scalar("SELECT quantity FROM cart_items WHERE cart_id = ? AND product_id = ?")
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(quantity)
}

async fn order_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, name_snapshot, quantity, price_cents, subtotal_cents \
         FROM order_items WHERE order_id = ? ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn find_order(conn: &mut SqliteConnection, scope: &TenantScope, id: &str) -> DbResult<Order> {
    let mut qb = scoped_query(ORDER_COLUMNS, scope, "tenant_id");
    qb.push(" AND id = ");
    qb.push_bind(id.to_string());

    qb.build_query_as::<Order>()
        .fetch_optional(&mut *conn)
        .await?
        .or_not_found("Order", id)
}

fn check_prices(price_cents: i64, original_price_cents: Option<i64>) -> DbResult<()> {
    validate_amount_cents("price", price_cents)?;
    if let Some(original) = original_price_cents {
        validate_amount_cents("original_price", original)?;
    }
    Ok(())
}

fn check_stock(stock_quantity: i64) -> DbResult<()> {
    validate_stock_level("stock_quantity", stock_quantity)?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct StorefrontRepository {
    pool: SqlitePool,
    rules: BusinessRules,
}

impl StorefrontRepository {
    pub fn new(pool: SqlitePool, rules: BusinessRules) -> Self {
        StorefrontRepository { pool, rules }
    }

    // -------------------------------------------------------------------------
    // Profile
    // -------------------------------------------------------------------------

    /// Creates the shop page. The slug is the shop admin's username.
    pub async fn setup(&self, actor: &Actor, setup: StorefrontSetup) -> DbResult<ShopProfile> {
        actor.require(Permission::ManageStorefront)?;
        let tenant_id = actor.write_tenant(setup.tenant_id.as_deref())?;
        setup.validate()?;

        let slug: String = sqlx::query_scalar("SELECT username FROM users WHERE id = ? AND role = 'shop_admin'")
            .bind(&tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .or_not_found("Shop admin", &tenant_id)?;

        let now = Utc::now();
        let profile = ShopProfile {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            slug,
            business_name: setup.business_name.trim().to_string(),
            description: normalize_optional(setup.description),
            email: normalize_optional(setup.email),
            phone: normalize_optional(setup.phone),
            address: normalize_optional(setup.address),
            city: normalize_optional(setup.city),
            theme: setup.theme,
            is_website_active: setup.is_website_active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO shop_profiles (id, tenant_id, slug, business_name, description, email, phone, address, city, \
             theme, is_website_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.tenant_id)
        .bind(&profile.slug)
        .bind(&profile.business_name)
        .bind(&profile.description)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(profile.theme)
        .bind(profile.is_website_active)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("tenant_id", &profile.tenant_id))?;

        info!(tenant_id = %profile.tenant_id, slug = %profile.slug, "Storefront set up");
        Ok(profile)
    }

    /// Replaces the profile fields. Slug and owner never change.
    pub async fn update_profile(&self, actor: &Actor, update: StorefrontSetup) -> DbResult<ShopProfile> {
        actor.require(Permission::ManageStorefront)?;
        let tenant_id = actor.write_tenant(update.tenant_id.as_deref())?;
        update.validate()?;

        let mut conn = self.pool.acquire().await?;
        let current = profile_for(&mut conn, &tenant_id).await?.or_not_found("Storefront", &tenant_id)?;

        let updated = ShopProfile {
            business_name: update.business_name.trim().to_string(),
            description: normalize_optional(update.description),
            email: normalize_optional(update.email),
            phone: normalize_optional(update.phone),
            address: normalize_optional(update.address),
            city: normalize_optional(update.city),
            theme: update.theme,
            is_website_active: update.is_website_active,
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            "UPDATE shop_profiles SET business_name = ?, description = ?, email = ?, phone = ?, address = ?, city = ?, \
             theme = ?, is_website_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&updated.business_name)
        .bind(&updated.description)
        .bind(&updated.email)
        .bind(&updated.phone)
        .bind(&updated.address)
        .bind(&updated.city)
        .bind(updated.theme)
        .bind(updated.is_website_active)
        .bind(updated.updated_at)
        .bind(&updated.id)
        .execute(&mut *conn)
        .await?;

        debug!(tenant_id = %updated.tenant_id, active = updated.is_website_active, "Storefront updated");
        Ok(updated)
    }

    /// The shop page of `tenant_id`, or of the actor's own shop.
    pub async fn profile(&self, actor: &Actor, tenant_id: Option<&str>) -> DbResult<ShopProfile> {
        let tenant_id = actor.write_tenant(tenant_id)?;
        let mut conn = self.pool.acquire().await?;
        profile_for(&mut conn, &tenant_id).await?.or_not_found("Storefront", &tenant_id)
    }

    // -------------------------------------------------------------------------
    // Web Catalogue
    // -------------------------------------------------------------------------

    pub async fn create_product(&self, actor: &Actor, new: NewShopProduct) -> DbResult<ShopProduct> {
        actor.require(Permission::ManageStorefront)?;
        let tenant_id = actor.write_tenant(new.tenant_id.as_deref())?;
        validate_name("name", &new.name)?;
        check_prices(new.price_cents, new.original_price_cents)?;
        check_stock(new.stock_quantity)?;

        let now = Utc::now();
        let product = ShopProduct {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            name: new.name.trim().to_string(),
            description: normalize_optional(new.description),
            category: normalize_optional(new.category),
            price_cents: new.price_cents,
            original_price_cents: new.original_price_cents,
            is_featured: new.is_featured,
            is_available: new.is_available,
            stock_quantity: new.stock_quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO shop_products (id, tenant_id, name, description, category, price_cents, original_price_cents, \
             is_featured, is_available, stock_quantity, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.original_price_cents)
        .bind(product.is_featured)
        .bind(product.is_available)
        .bind(product.stock_quantity)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(shop_product_id = %product.id, tenant_id = %product.tenant_id, "Web product created");
        Ok(product)
    }

    pub async fn update_product(&self, actor: &Actor, id: &str, update: ShopProductUpdate) -> DbResult<ShopProduct> {
        actor.require(Permission::ManageStorefront)?;
        let scope = actor.scope()?;

        let mut conn = self.pool.acquire().await?;
        let current = find_shop_product(&mut conn, &scope, id).await?.or_not_found("Shop product", id)?;

        if let Some(name) = &update.name {
            validate_name("name", name)?;
        }
        let price_cents = update.price_cents.unwrap_or(current.price_cents);
        let original_price_cents = update.original_price_cents.or(current.original_price_cents);
        check_prices(price_cents, original_price_cents)?;
        let stock_quantity = update.stock_quantity.unwrap_or(current.stock_quantity);
        check_stock(stock_quantity)?;

        let updated = ShopProduct {
            name: update.name.map(|n| n.trim().to_string()).unwrap_or(current.name.clone()),
            description: update.description.map(Some).map(normalize_optional).unwrap_or(current.description.clone()),
            category: update.category.map(Some).map(normalize_optional).unwrap_or(current.category.clone()),
            price_cents,
            original_price_cents,
            is_featured: update.is_featured.unwrap_or(current.is_featured),
            is_available: update.is_available.unwrap_or(current.is_available),
            stock_quantity,
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            "UPDATE shop_products SET name = ?, description = ?, category = ?, price_cents = ?, original_price_cents = ?, \
             is_featured = ?, is_available = ?, stock_quantity = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(&updated.category)
        .bind(updated.price_cents)
        .bind(updated.original_price_cents)
        .bind(updated.is_featured)
        .bind(updated.is_available)
        .bind(updated.stock_quantity)
        .bind(updated.updated_at)
        .bind(&updated.id)
        .execute(&mut *conn)
        .await?;

        debug!(shop_product_id = %updated.id, "Web product updated");
        Ok(updated)
    }

    /// Takes a product off the web shop.
    ///
    /// ## Errors
    /// `InvalidState` while any order that is not cancelled still
    /// references the product.
    pub async fn retire_product(&self, actor: &Actor, id: &str) -> DbResult<()> {
        actor.require(Permission::ManageStorefront)?;
        let scope = actor.scope()?;

        let mut tx = begin_write(&self.pool).await?;
        let product = find_shop_product(&mut tx, &scope, id).await?.or_not_found("Shop product", id)?;

        let open_orders: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT o.id) FROM order_items oi JOIN orders o ON o.id = oi.order_id \
             WHERE oi.product_id = ? AND o.order_status != 'cancelled'",
        )
        .bind(&product.id)
        .fetch_one(&mut *tx)
        .await?;

        if open_orders > 0 {
            return Err(CoreError::invalid_state(
                "Shop product",
                &product.name,
                format!("referenced by {} open order(s)", open_orders),
                "retire",
            )
            .into());
        }

        sqlx::query("UPDATE shop_products SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(&product.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cart_items WHERE product_id = ?")
            .bind(&product.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(shop_product_id = %product.id, "Web product retired");
        Ok(())
    }

    /// Every web product of the scope, retired ones included.
    pub async fn list_products(&self, scope: &TenantScope) -> DbResult<Vec<ListedProduct>> {
        let mut qb = scoped_query(SHOP_PRODUCT_COLUMNS, scope, "tenant_id");
        qb.push(" ORDER BY is_active DESC, name");

        let products = qb.build_query_as::<ShopProduct>().fetch_all(&self.pool).await?;
        Ok(products.into_iter().map(ListedProduct::from).collect())
    }

    /// Public listing: available, in stock and active, featured first.
    pub async fn public_products(&self, slug: &str) -> DbResult<Vec<ListedProduct>> {
        let mut conn = self.pool.acquire().await?;
        let shop = shop_by_slug(&mut conn, slug).await?;

        let mut qb = scoped_query(SHOP_PRODUCT_COLUMNS, &shop_scope(&shop), "tenant_id");
        qb.push(" AND is_active = 1 AND is_available = 1 AND stock_quantity > 0 ORDER BY is_featured DESC, name");
        let products = qb.build_query_as::<ShopProduct>().fetch_all(&mut *conn).await?;

        Ok(products.into_iter().map(ListedProduct::from).collect())
    }

    // -------------------------------------------------------------------------
    // Carts
    // -------------------------------------------------------------------------

    /// Opens an anonymous cart on a shop.
    pub async fn create_cart(&self, slug: &str) -> DbResult<CartView> {
        let mut conn = self.pool.acquire().await?;
        let shop = shop_by_slug(&mut conn, slug).await?;

        let cart_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query("INSERT INTO carts (id, tenant_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&cart_id)
            .bind(&shop.tenant_id)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        debug!(cart_id = %cart_id, slug = %slug, "Cart opened");
        Ok(CartView::new(cart_id, Vec::new()))
    }

    pub async fn cart(&self, slug: &str, cart_id: &str) -> DbResult<CartView> {
        let mut conn = self.pool.acquire().await?;
        let shop = shop_by_slug(&mut conn, slug).await?;
        ensure_cart(&mut conn, &shop, cart_id).await?;
        let lines = cart_lines(&mut conn, cart_id).await?;
        Ok(CartView::new(cart_id, lines))
    }

    /// Adds units of a product; the cart total for it may not exceed stock.
    pub async fn add_to_cart(&self, slug: &str, cart_id: &str, product_id: &str, quantity: i64) -> DbResult<CartView> {
        let mut tx = begin_write(&self.pool).await?;
        let shop = shop_by_slug(&mut tx, slug).await?;
        ensure_cart(&mut tx, &shop, cart_id).await?;

        let product = find_shop_product(&mut tx, &shop_scope(&shop), product_id)
            .await?
            .or_not_found("Shop product", product_id)?;
        if quantity < 1 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        let existing = cart_quantity(&mut tx, cart_id, product_id).await?.unwrap_or(0);
        ensure_cart_quantity(&product, existing.saturating_add(quantity))?;

        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity, added_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = quantity + excluded.quantity",
        )
        .bind(cart_id)
        .bind(&product.id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        self.touch_cart(&mut tx, cart_id).await?;

        let lines = cart_lines(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(CartView::new(cart_id, lines))
    }

    /// Sets the quantity of a product already in the cart.
    pub async fn update_cart_item(&self, slug: &str, cart_id: &str, product_id: &str, quantity: i64) -> DbResult<CartView> {
        let mut tx = begin_write(&self.pool).await?;
        let shop = shop_by_slug(&mut tx, slug).await?;
        ensure_cart(&mut tx, &shop, cart_id).await?;

        cart_quantity(&mut tx, cart_id, product_id)
            .await?
            .or_not_found("Cart item", product_id)?;
        let product = find_shop_product(&mut tx, &shop_scope(&shop), product_id)
            .await?
            .or_not_found("Shop product", product_id)?;
        ensure_cart_quantity(&product, quantity)?;

        sqlx::query("UPDATE cart_items SET quantity = ? WHERE cart_id = ? AND product_id = ?")
            .bind(quantity)
            .bind(cart_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        self.touch_cart(&mut tx, cart_id).await?;

        let lines = cart_lines(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(CartView::new(cart_id, lines))
    }

    pub async fn remove_cart_item(&self, slug: &str, cart_id: &str, product_id: &str) -> DbResult<CartView> {
        let mut tx = begin_write(&self.pool).await?;
        let shop = shop_by_slug(&mut tx, slug).await?;
        ensure_cart(&mut tx, &shop, cart_id).await?;

        let removed = sqlx::query("DELETE FROM cart_items WHERE cart_id = ? AND product_id = ?")
            .bind(cart_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", product_id));
        }
        self.touch_cart(&mut tx, cart_id).await?;

        let lines = cart_lines(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(CartView::new(cart_id, lines))
    }

    async fn touch_cart(&self, conn: &mut SqliteConnection, cart_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE carts SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Turns a cart into an order.
    ///
    /// ## Flow
    /// ```text
    /// BEGIN
    ///   for each cart line:
    ///     UPDATE shop_products SET stock_quantity = stock_quantity - q
    ///       WHERE id = ? AND stock_quantity >= q     → 0 rows: InsufficientStock
    ///   INSERT order (Pending) + items with price snapshot
    ///   DELETE cart
    /// COMMIT
    /// ```
    pub async fn checkout(&self, slug: &str, cart_id: &str, details: CheckoutDetails) -> DbResult<OrderDetail> {
        details.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let shop = shop_by_slug(&mut tx, slug).await?;
        ensure_cart(&mut tx, &shop, cart_id).await?;

        let cart = CartView::new(cart_id, cart_lines(&mut tx, cart_id).await?);
        if cart.is_empty() {
            return Err(CoreError::invalid_state("Cart", cart_id, "empty", "check out").into());
        }

        let tenant = shop_scope(&shop);
        for line in &cart.items {
            let product = find_shop_product(&mut tx, &tenant, &line.product_id)
                .await?
                .or_not_found("Shop product", &line.product_id)?;
            if !product.is_active || !product.is_available {
                return Err(CoreError::invalid_state("Shop product", &product.name, "unavailable", "check out").into());
            }

            let result = sqlx::query(
                "UPDATE shop_products SET stock_quantity = stock_quantity - ?, updated_at = ? \
                 WHERE id = ? AND stock_quantity >= ?",
            )
            .bind(line.quantity)
            .bind(Utc::now())
            .bind(&line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(cart_id = %cart_id, product_id = %line.product_id, "Checkout refused: stock changed");
                return Err(CoreError::InsufficientStock {
                    sku: line.name.clone(),
                    available: product.stock_quantity,
                    requested: line.quantity,
                }
                .into());
            }
        }

        let subtotal = cart.checkout_subtotal()?;
        let delivery_fee = Money::from_cents(self.rules.storefront_delivery_fee_cents);
        let total = subtotal
            .checked_add(delivery_fee)
            .ok_or_else(|| CoreError::overflow("order total"))?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let order = Order {
            id: id.to_string(),
            tenant_id: shop.tenant_id.clone(),
            order_number: order_number(id),
            customer_name: details.customer_name.trim().to_string(),
            customer_email: details.customer_email.trim().to_string(),
            customer_phone: details.customer_phone.trim().to_string(),
            delivery_address: normalize_optional(details.delivery_address),
            notes: normalize_optional(details.notes),
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal_cents: subtotal.cents(),
            delivery_fee_cents: delivery_fee.cents(),
            total_amount_cents: total.cents(),
            signed_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO orders (id, tenant_id, order_number, customer_name, customer_email, customer_phone, \
             delivery_address, notes, order_status, payment_status, subtotal_cents, delivery_fee_cents, \
             total_amount_cents, signed_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.order_number)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.delivery_address)
        .bind(&order.notes)
        .bind(order.order_status)
        .bind(order.payment_status)
        .bind(order.subtotal_cents)
        .bind(order.delivery_fee_cents)
        .bind(order.total_amount_cents)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.clone(),
                quantity: line.quantity,
                price_cents: line.unit_price_cents,
                subtotal_cents: line.subtotal().cents(),
            };
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, name_snapshot, quantity, price_cents, subtotal_cents) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        sqlx::query("DELETE FROM carts WHERE id = ?")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            tenant_id = %order.tenant_id,
            total_cents = order.total_amount_cents,
            lines = items.len(),
            "Web order placed"
        );
        Ok(OrderDetail { order, items })
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    pub async fn list_orders(&self, scope: &TenantScope, status: Option<OrderStatus>) -> DbResult<Vec<Order>> {
        let mut qb = scoped_query(ORDER_COLUMNS, scope, "tenant_id");
        if let Some(status) = status {
            qb.push(" AND order_status = ");
            qb.push_bind(status);
        }
        qb.push(" ORDER BY created_at DESC");

        let orders = qb.build_query_as::<Order>().fetch_all(&self.pool).await?;
        Ok(orders)
    }

    pub async fn order(&self, scope: &TenantScope, id: &str) -> DbResult<OrderDetail> {
        let mut conn = self.pool.acquire().await?;
        let order = find_order(&mut conn, scope, id).await?;
        let items = order_items(&mut conn, &order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// Moves an order to `to`. Cancelling puts the ordered units back on
    /// the web products; a cancelled order cannot move again.
    pub async fn update_order_status(&self, actor: &Actor, id: &str, to: OrderStatus) -> DbResult<Order> {
        actor.require(Permission::ManageStorefront)?;
        let scope = actor.scope()?;

        let mut tx = begin_write(&self.pool).await?;
        let order = find_order(&mut tx, &scope, id).await?;
        let restore = OrderStatus::transition(&order.order_number, order.order_status, to)?;

        if restore {
            for item in order_items(&mut tx, &order.id).await? {
                sqlx::query("UPDATE shop_products SET stock_quantity = stock_quantity + ?, updated_at = ? WHERE id = ?")
                    .bind(item.quantity)
                    .bind(Utc::now())
                    .bind(&item.product_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let now = Utc::now();
        let signed_at = if to == OrderStatus::Signed {
            Some(order.signed_at.unwrap_or(now))
        } else {
            order.signed_at
        };
        let updated = Order {
            order_status: to,
            signed_at,
            updated_at: now,
            ..order
        };

        sqlx::query("UPDATE orders SET order_status = ?, signed_at = ?, updated_at = ? WHERE id = ?")
            .bind(updated.order_status)
            .bind(updated.signed_at)
            .bind(updated.updated_at)
            .bind(&updated.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            order_number = %updated.order_number,
            status = to.as_str(),
            stock_restored = restore,
            "Order status changed"
        );
        Ok(updated)
    }

    pub async fn update_payment_status(&self, actor: &Actor, id: &str, status: PaymentStatus) -> DbResult<Order> {
        actor.require(Permission::ManageStorefront)?;
        let scope = actor.scope()?;

        let mut conn = self.pool.acquire().await?;
        let order = find_order(&mut conn, &scope, id).await?;
        let updated = Order {
            payment_status: status,
            updated_at: Utc::now(),
            ..order
        };

        sqlx::query("UPDATE orders SET payment_status = ?, updated_at = ? WHERE id = ?")
            .bind(updated.payment_status)
            .bind(updated.updated_at)
            .bind(&updated.id)
            .execute(&mut *conn)
            .await?;

        debug!(order_number = %updated.order_number, "Order payment status changed");
        Ok(updated)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, Fixture};

    struct Shop {
        f: Fixture,
        mug: ShopProduct,
        tee: ShopProduct,
    }

    async fn shop() -> Shop {
        let f = fixture().await;
        let repo = f.db.storefront();
        repo.setup(
            &f.shop,
            StorefrontSetup {
                business_name: "Corner Store".into(),
                ..StorefrontSetup::default()
            },
        )
        .await
        .unwrap();

        let mug = repo
            .create_product(
                &f.shop,
                NewShopProduct {
                    name: "Mug".into(),
                    price_cents: 1_200,
                    original_price_cents: Some(1_500),
                    is_available: true,
                    stock_quantity: 3,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let tee = repo
            .create_product(
                &f.shop,
                NewShopProduct {
                    name: "Tee".into(),
                    price_cents: 2_000,
                    is_available: true,
                    stock_quantity: 5,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        Shop { f, mug, tee }
    }

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            customer_name: "Bea".into(),
            customer_email: "bea@example.com".into(),
            customer_phone: "0700 000 000".into(),
            delivery_address: Some("1 Main St".into()),
            notes: None,
        }
    }

    async fn stock_of(s: &Shop, id: &str) -> i64 {
        sqlx::query_scalar("SELECT stock_quantity FROM shop_products WHERE id = ?")
            .bind(id)
            .fetch_one(s.f.db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_setup_uses_username_slug() {
        let s = shop().await;
        let repo = s.f.db.storefront();
        let profile = repo.profile(&s.f.shop, None).await.unwrap();
        assert_eq!(profile.slug, "corner");

        let again = repo
            .setup(
                &s.f.shop,
                StorefrontSetup {
                    business_name: "Again".into(),
                    ..StorefrontSetup::default()
                },
            )
            .await;
        assert!(matches!(again, Err(DbError::UniqueViolation { .. })));

        assert!(matches!(
            repo.create_product(&s.f.cashier, NewShopProduct::default()).await,
            Err(DbError::Core(CoreError::PermissionDenied { .. }))
        ));
    }

    #[tokio::test]
    async fn test_public_listing_filters() {
        let s = shop().await;
        let repo = s.f.db.storefront();
        repo.update_product(
            &s.f.shop,
            &s.tee.id,
            ShopProductUpdate {
                is_available: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let listed = repo.public_products("corner").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].product.id, s.mug.id);
        assert_eq!(listed[0].discount_bps, 2_000);

        assert!(matches!(repo.public_products("market").await, Err(DbError::NotFound { .. })));

        let mut hidden = StorefrontSetup {
            business_name: "Corner Store".into(),
            ..StorefrontSetup::default()
        };
        hidden.is_website_active = false;
        repo.update_profile(&s.f.shop, hidden).await.unwrap();
        assert!(matches!(repo.public_products("corner").await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cart_respects_stock() {
        let s = shop().await;
        let repo = s.f.db.storefront();
        let cart = repo.create_cart("corner").await.unwrap();

        let view = repo.add_to_cart("corner", &cart.cart_id, &s.mug.id, 2).await.unwrap();
        assert_eq!(view.total_items, 2);
        assert!(matches!(
            repo.add_to_cart("corner", &cart.cart_id, &s.mug.id, 2).await,
            Err(DbError::Core(CoreError::InsufficientStock { available: 3, requested: 4, .. }))
        ));

        let view = repo.add_to_cart("corner", &cart.cart_id, &s.tee.id, 1).await.unwrap();
        assert_eq!(view.total_price_cents, 2 * 1_200 + 2_000);

        let view = repo.update_cart_item("corner", &cart.cart_id, &s.mug.id, 3).await.unwrap();
        assert_eq!(view.total_items, 4);

        let view = repo.remove_cart_item("corner", &cart.cart_id, &s.tee.id).await.unwrap();
        assert_eq!(view.items.len(), 1);

        // A cart is only reachable through its own shop
        repo.setup(
            &s.f.other_shop,
            StorefrontSetup {
                business_name: "Market".into(),
                ..StorefrontSetup::default()
            },
        )
        .await
        .unwrap();
        assert!(matches!(repo.cart("market", &cart.cart_id).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_public_pages_stay_within_their_shop() {
        let s = shop().await;
        let repo = s.f.db.storefront();
        repo.setup(
            &s.f.other_shop,
            StorefrontSetup {
                business_name: "Market".into(),
                ..StorefrontSetup::default()
            },
        )
        .await
        .unwrap();
        let crate_box = repo
            .create_product(
                &s.f.other_shop,
                NewShopProduct {
                    name: "Crate".into(),
                    price_cents: 700,
                    is_available: true,
                    stock_quantity: 4,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let market_id = s.f.other_shop.tenant_id.clone().unwrap();
        let profile = repo.profile(&s.f.site, Some(&market_id)).await.unwrap();
        assert_eq!(profile.slug, "market");

        let listed = repo.public_products("market").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].product.id, crate_box.id);
        assert_eq!(repo.public_products("corner").await.unwrap().len(), 2);

        // Another shop's product cannot go into this shop's cart
        let cart = repo.create_cart("market").await.unwrap();
        assert!(matches!(
            repo.add_to_cart("market", &cart.cart_id, &s.mug.id, 1).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.add_to_cart("market", &cart.cart_id, &crate_box.id, i64::MAX).await,
            Err(DbError::Core(CoreError::InsufficientStock { .. }))
        ));
    }

    #[tokio::test]
    async fn test_checkout_and_cancel_restores_once() {
        let s = shop().await;
        let repo = s.f.db.storefront();
        let cart = repo.create_cart("corner").await.unwrap();
        repo.add_to_cart("corner", &cart.cart_id, &s.mug.id, 2).await.unwrap();
        repo.add_to_cart("corner", &cart.cart_id, &s.tee.id, 1).await.unwrap();

        let placed = repo.checkout("corner", &cart.cart_id, details()).await.unwrap();
        assert_eq!(placed.items.len(), 2);
        assert_eq!(placed.order.subtotal_cents, 4_400);
        assert_eq!(placed.order.total_amount_cents, 4_400);
        assert_eq!(placed.order.order_status, OrderStatus::Pending);
        assert_eq!(stock_of(&s, &s.mug.id).await, 1);
        assert_eq!(stock_of(&s, &s.tee.id).await, 4);

        // The cart is gone after checkout
        assert!(matches!(repo.cart("corner", &cart.cart_id).await, Err(DbError::NotFound { .. })));

        let id = placed.order.id.clone();
        assert!(matches!(
            repo.retire_product(&s.f.shop, &s.mug.id).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));

        repo.update_order_status(&s.f.shop, &id, OrderStatus::Shipped).await.unwrap();
        let cancelled = repo.update_order_status(&s.f.shop, &id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&s, &s.mug.id).await, 3);
        assert_eq!(stock_of(&s, &s.tee.id).await, 5);

        assert!(matches!(
            repo.update_order_status(&s.f.shop, &id, OrderStatus::Pending).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));
        assert!(matches!(
            repo.update_order_status(&s.f.shop, &id, OrderStatus::Cancelled).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));
        assert_eq!(stock_of(&s, &s.mug.id).await, 3);

        repo.retire_product(&s.f.shop, &s.mug.id).await.unwrap();
        assert!(repo.public_products("corner").await.unwrap().iter().all(|p| p.product.id != s.mug.id));
    }

    #[tokio::test]
    async fn test_checkout_rejects_stale_stock() {
        let s = shop().await;
        let repo = s.f.db.storefront();
        let cart = repo.create_cart("corner").await.unwrap();
        repo.add_to_cart("corner", &cart.cart_id, &s.tee.id, 1).await.unwrap();
        repo.add_to_cart("corner", &cart.cart_id, &s.mug.id, 3).await.unwrap();

        // Stock sold elsewhere after the cart was filled
        repo.update_product(
            &s.f.shop,
            &s.mug.id,
            ShopProductUpdate {
                stock_quantity: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            repo.checkout("corner", &cart.cart_id, details()).await,
            Err(DbError::Core(CoreError::InsufficientStock { .. }))
        ));
        // Nothing was taken, the cart survives
        assert_eq!(stock_of(&s, &s.tee.id).await, 5);
        assert_eq!(repo.cart("corner", &cart.cart_id).await.unwrap().total_items, 4);

        let empty = repo.create_cart("corner").await.unwrap();
        assert!(matches!(
            repo.checkout("corner", &empty.cart_id, details()).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));

        let mut bad = details();
        bad.customer_email = "nope".into();
        assert!(repo.checkout("corner", &cart.cart_id, bad).await.is_err());
    }

    #[tokio::test]
    async fn test_orders_scoped_and_payment_status() {
        let s = shop().await;
        let repo = s.f.db.storefront();
        let cart = repo.create_cart("corner").await.unwrap();
        repo.add_to_cart("corner", &cart.cart_id, &s.tee.id, 1).await.unwrap();
        let placed = repo.checkout("corner", &cart.cart_id, details()).await.unwrap();

        let shop_scope = s.f.shop.scope().unwrap();
        assert_eq!(repo.list_orders(&shop_scope, Some(OrderStatus::Pending)).await.unwrap().len(), 1);
        assert!(repo.list_orders(&shop_scope, Some(OrderStatus::Shipped)).await.unwrap().is_empty());
        assert!(repo.list_orders(&s.f.other_shop.scope().unwrap(), None).await.unwrap().is_empty());
        assert!(matches!(
            repo.order(&s.f.other_shop.scope().unwrap(), &placed.order.id).await,
            Err(DbError::NotFound { .. })
        ));

        let paid = repo
            .update_payment_status(&s.f.shop, &placed.order.id, PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let signed = repo
            .update_order_status(&s.f.shop, &placed.order.id, OrderStatus::Signed)
            .await
            .unwrap();
        assert!(signed.signed_at.is_some());
    }
}
