//! # Product Repository
//!
//! Catalogue products, their stock rows and the stock movement log.
//!
//! ## Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Every stock change is two writes                     │
//! │                                                                         │
//! │   BEGIN                                                                 │
//! │     UPDATE stock SET quantity = quantity - 3                            │
//! │      WHERE product_id = ? AND quantity >= 3      ← 0 rows? Insufficient │
//! │     INSERT INTO stock_movements (type = 'out', quantity = 3, ...)       │
//! │   COMMIT                                                                │
//! │                                                                         │
//! │   The WHERE clause makes the check and the decrement one statement, so │
//! │   two tills selling the last unit cannot both succeed. The CHECK       │
//! │   (quantity >= 0) on the table backs it up.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The decrement, restore and movement helpers are shared with the sale
//! repository, which runs them inside its own transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use shopdesk_core::validation::{
    normalize_optional, validate_amount_cents, validate_name, validate_quantity, validate_search_query,
    validate_sku, validate_stock_level, MAX_UNIT_QUANTITY,
};
use shopdesk_core::{
    Actor, CoreError, MovementType, Permission, Product, StockAdjustment, StockMovement, TenantScope,
    DEFAULT_MAX_STOCK, DEFAULT_REORDER_LEVEL,
};

use crate::error::{on_duplicate, DbResult, OrNotFound};
use crate::repository::begin_write;
use crate::scope::scoped_query;

const PRODUCT_COLUMNS: &str = "SELECT p.id, p.tenant_id, p.sku, p.barcode, p.name, p.description, p.category, \
     p.cost_price_cents, p.selling_price_cents, p.is_active, \
     s.quantity, s.reorder_level, s.max_stock, s.location, \
     p.created_at, p.updated_at \
     FROM products p JOIN stock s ON s.product_id = p.id";

const MOVEMENT_COLUMNS: &str = "SELECT id, tenant_id, product_id, movement_type, quantity, reference, notes, \
     created_by, created_at FROM stock_movements";

// =============================================================================
// Requests
// =============================================================================

/// Fields for a new product and its stock row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    /// Owning shop; site admins must set it.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    #[serde(default)]
    pub initial_quantity: i64,
    #[serde(default)]
    pub reorder_level: Option<i64>,
    #[serde(default)]
    pub max_stock: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Partial product update; `None` leaves a field unchanged.
///
/// Quantity is not here: stock changes go through
/// [`ProductRepository::adjust_stock`] so they are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cost_price_cents: Option<i64>,
    pub selling_price_cents: Option<i64>,
    pub reorder_level: Option<i64>,
    pub max_stock: Option<i64>,
    pub location: Option<String>,
}

/// A manual stock adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustmentRequest {
    pub kind: StockAdjustment,
    /// Units to add or remove; the new absolute level for `Set`.
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Shared Stock Helpers
// =============================================================================

/// One row for the movement log.
#[derive(Debug)]
pub(crate) struct NewMovement<'a> {
    pub tenant_id: &'a str,
    pub product_id: &'a str,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reference: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub created_by: &'a str,
}

/// Appends a movement to the log.
pub(crate) async fn record_movement(conn: &mut SqliteConnection, movement: NewMovement<'_>) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO stock_movements (id, tenant_id, product_id, movement_type, quantity, reference, notes, created_by, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(movement.tenant_id)
    .bind(movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(movement.reference)
    .bind(movement.notes)
    .bind(movement.created_by)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Removes `quantity` units, failing instead of going below zero.
///
/// ## Errors
/// `InsufficientStock` when fewer than `quantity` units are on hand. The
/// caller's transaction should be dropped so nothing else it wrote sticks.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    sku: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE stock SET quantity = quantity - ?, updated_at = ? WHERE product_id = ? AND quantity >= ?",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i64> = sqlx::query_scalar("SELECT quantity FROM stock WHERE product_id = ?")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

        debug!(product_id = %product_id, requested = quantity, ?available, "Stock decrement refused");

        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available: available.unwrap_or(0),
            requested: quantity,
        }
        .into());
    }
    Ok(())
}

/// Puts `quantity` units back.
pub(crate) async fn restore_stock(conn: &mut SqliteConnection, product_id: &str, quantity: i64) -> DbResult<()> {
    sqlx::query("UPDATE stock SET quantity = quantity + ?, updated_at = ? WHERE product_id = ?")
        .bind(quantity)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Loads a product with its stock row inside `scope`.
pub(crate) async fn find_product(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<Option<Product>> {
    let mut qb = scoped_query(PRODUCT_COLUMNS, scope, "p.tenant_id");
    qb.push(" AND p.id = ");
    qb.push_bind(id.to_string());

    let product = qb.build_query_as::<Product>().fetch_optional(&mut *conn).await?;
    Ok(product)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for products and stock.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product together with its stock row.
    ///
    /// ## What This Does
    /// 1. Inserts the product (SKU unique per shop)
    /// 2. Inserts the stock row with the initial quantity
    /// 3. Logs an `In` movement when the initial quantity is positive
    ///
    /// All three happen in one transaction.
    pub async fn create(&self, actor: &Actor, new: NewProduct) -> DbResult<Product> {
        actor.require(Permission::ManageProducts)?;
        let tenant_id = actor.write_tenant(new.tenant_id.as_deref())?;

        let sku = new.sku.trim().to_string();
        validate_sku(&sku)?;
        validate_name("name", &new.name)?;
        validate_amount_cents("cost_price", new.cost_price_cents)?;
        validate_amount_cents("selling_price", new.selling_price_cents)?;
        validate_stock_level("initial_quantity", new.initial_quantity)?;

        let reorder_level = new.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL);
        let max_stock = new.max_stock.unwrap_or(DEFAULT_MAX_STOCK);
        validate_stock_level("reorder_level", reorder_level)?;
        validate_stock_level("max_stock", max_stock)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            sku,
            barcode: normalize_optional(new.barcode),
            name: new.name.trim().to_string(),
            description: normalize_optional(new.description),
            category: normalize_optional(new.category),
            cost_price_cents: new.cost_price_cents,
            selling_price_cents: new.selling_price_cents,
            is_active: true,
            quantity: new.initial_quantity,
            reorder_level,
            max_stock,
            location: normalize_optional(new.location),
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, tenant_id = %product.tenant_id, "Creating product");

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            "INSERT INTO products (id, tenant_id, sku, barcode, name, description, category, \
             cost_price_cents, selling_price_cents, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.cost_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(on_duplicate("sku", &product.sku))?;

        sqlx::query(
            "INSERT INTO stock (product_id, quantity, reorder_level, max_stock, location, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(product.quantity)
        .bind(product.reorder_level)
        .bind(product.max_stock)
        .bind(&product.location)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if product.quantity > 0 {
            record_movement(
                &mut tx,
                NewMovement {
                    tenant_id: &product.tenant_id,
                    product_id: &product.id,
                    movement_type: MovementType::In,
                    quantity: product.quantity,
                    reference: None,
                    notes: Some("Initial stock"),
                    created_by: &actor.user_id,
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(product_id = %product.id, sku = %product.sku, quantity = product.quantity, "Product created");
        Ok(product)
    }

    /// Applies a partial update to a product and its stock settings.
    pub async fn update(&self, actor: &Actor, id: &str, update: ProductUpdate) -> DbResult<Product> {
        actor.require(Permission::ManageProducts)?;
        let scope = actor.scope()?;

        let mut tx = begin_write(&self.pool).await?;
        let current = find_product(&mut tx, &scope, id).await?.or_not_found("Product", id)?;

        let sku = match update.sku {
            Some(sku) => {
                let sku = sku.trim().to_string();
                validate_sku(&sku)?;
                sku
            }
            None => current.sku.clone(),
        };
        let name = match update.name {
            Some(name) => {
                validate_name("name", &name)?;
                name.trim().to_string()
            }
            None => current.name.clone(),
        };
        let cost_price_cents = update.cost_price_cents.unwrap_or(current.cost_price_cents);
        let selling_price_cents = update.selling_price_cents.unwrap_or(current.selling_price_cents);
        validate_amount_cents("cost_price", cost_price_cents)?;
        validate_amount_cents("selling_price", selling_price_cents)?;
        let reorder_level = update.reorder_level.unwrap_or(current.reorder_level);
        let max_stock = update.max_stock.unwrap_or(current.max_stock);
        validate_stock_level("reorder_level", reorder_level)?;
        validate_stock_level("max_stock", max_stock)?;

        let updated = Product {
            sku,
            name,
            barcode: update.barcode.map(Some).map(normalize_optional).unwrap_or(current.barcode.clone()),
            description: update
                .description
                .map(Some)
                .map(normalize_optional)
                .unwrap_or(current.description.clone()),
            category: update.category.map(Some).map(normalize_optional).unwrap_or(current.category.clone()),
            location: update.location.map(Some).map(normalize_optional).unwrap_or(current.location.clone()),
            cost_price_cents,
            selling_price_cents,
            reorder_level,
            max_stock,
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            "UPDATE products SET sku = ?, barcode = ?, name = ?, description = ?, category = ?, \
             cost_price_cents = ?, selling_price_cents = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&updated.sku)
        .bind(&updated.barcode)
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(&updated.category)
        .bind(updated.cost_price_cents)
        .bind(updated.selling_price_cents)
        .bind(updated.updated_at)
        .bind(&updated.id)
        .execute(&mut *tx)
        .await
        .map_err(on_duplicate("sku", &updated.sku))?;

        sqlx::query("UPDATE stock SET reorder_level = ?, max_stock = ?, location = ?, updated_at = ? WHERE product_id = ?")
            .bind(updated.reorder_level)
            .bind(updated.max_stock)
            .bind(&updated.location)
            .bind(updated.updated_at)
            .bind(&updated.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(product_id = %updated.id, "Product updated");
        Ok(updated)
    }

    /// Soft-deletes a product. Sale history keeps referencing it.
    pub async fn deactivate(&self, actor: &Actor, id: &str) -> DbResult<Product> {
        actor.require(Permission::ManageProducts)?;
        let product = self.get(&actor.scope()?, id).await?;

        let now = Utc::now();
        sqlx::query("UPDATE products SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&product.id)
            .execute(&self.pool)
            .await?;

        info!(product_id = %product.id, sku = %product.sku, "Product deactivated");
        Ok(Product {
            is_active: false,
            updated_at: now,
            ..product
        })
    }

    pub async fn get(&self, scope: &TenantScope, id: &str) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        find_product(&mut conn, scope, id).await?.or_not_found("Product", id)
    }

    /// Lists products, optionally filtered by a search over name, SKU and
    /// barcode.
    pub async fn list(
        &self,
        scope: &TenantScope,
        search: Option<&str>,
        include_inactive: bool,
    ) -> DbResult<Vec<Product>> {
        let mut qb = scoped_query(PRODUCT_COLUMNS, scope, "p.tenant_id");

        if !include_inactive {
            qb.push(" AND p.is_active = 1");
        }

        if let Some(query) = search {
            let query = validate_search_query(query)?;
            if !query.is_empty() {
                let pattern = format!("%{}%", query);
                qb.push(" AND (p.name LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR p.sku LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR p.barcode LIKE ");
                qb.push_bind(pattern);
                qb.push(")");
            }
        }

        qb.push(" ORDER BY p.name");

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;
        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Active products at or below their reorder level, emptiest first.
    pub async fn low_stock(&self, scope: &TenantScope) -> DbResult<Vec<Product>> {
        let mut qb = scoped_query(PRODUCT_COLUMNS, scope, "p.tenant_id");
        qb.push(" AND p.is_active = 1 AND s.quantity <= s.reorder_level ORDER BY s.quantity, p.name");

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Adjusts stock by hand and logs the movement.
    ///
    /// ## Errors
    /// - `PermissionDenied` for cashiers
    /// - `InsufficientStock` when removing more than is on hand
    pub async fn adjust_stock(
        &self,
        actor: &Actor,
        product_id: &str,
        request: StockAdjustmentRequest,
    ) -> DbResult<Product> {
        actor.require(Permission::AdjustStock)?;
        let scope = actor.scope()?;

        match request.kind {
            StockAdjustment::Set => validate_stock_level("quantity", request.quantity)?,
            StockAdjustment::Add | StockAdjustment::Remove => validate_quantity(request.quantity, MAX_UNIT_QUANTITY)?,
        }
        let notes = normalize_optional(request.notes);

        let mut tx = begin_write(&self.pool).await?;
        let product = find_product(&mut tx, &scope, product_id)
            .await?
            .or_not_found("Product", product_id)?;

        match request.kind {
            StockAdjustment::Add => restore_stock(&mut tx, &product.id, request.quantity).await?,
            StockAdjustment::Remove => decrement_stock(&mut tx, &product.id, &product.sku, request.quantity).await?,
            StockAdjustment::Set => {
                sqlx::query("UPDATE stock SET quantity = ?, updated_at = ? WHERE product_id = ?")
                    .bind(request.quantity)
                    .bind(Utc::now())
                    .bind(&product.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        record_movement(
            &mut tx,
            NewMovement {
                tenant_id: &product.tenant_id,
                product_id: &product.id,
                movement_type: request.kind.movement_type(),
                quantity: request.quantity,
                reference: None,
                notes: notes.as_deref(),
                created_by: &actor.user_id,
            },
        )
        .await?;

        let adjusted = find_product(&mut tx, &scope, &product.id)
            .await?
            .or_not_found("Product", product_id)?;
        tx.commit().await?;

        info!(
            product_id = %adjusted.id,
            kind = ?request.kind,
            quantity = request.quantity,
            on_hand = adjusted.quantity,
            "Stock adjusted"
        );
        Ok(adjusted)
    }

    /// Movement log, newest first.
    pub async fn movements(
        &self,
        scope: &TenantScope,
        product_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let mut qb = scoped_query(MOVEMENT_COLUMNS, scope, "tenant_id");
        if let Some(product_id) = product_id {
            qb.push(" AND product_id = ");
            qb.push_bind(product_id.to_string());
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        qb.push_bind(i64::from(limit));

        let movements = qb.build_query_as::<StockMovement>().fetch_all(&self.pool).await?;
        Ok(movements)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing::{fixture, product};

    #[tokio::test]
    async fn test_create_logs_initial_stock() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "COKE-330", 24, 150).await;

        let scope = f.shop.scope().unwrap();
        let stored = f.db.products().get(&scope, &p.id).await.unwrap();
        assert_eq!(stored.quantity, 24);
        assert_eq!(stored.reorder_level, DEFAULT_REORDER_LEVEL);

        let log = f.db.products().movements(&scope, Some(&p.id), 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].movement_type, MovementType::In);
        assert_eq!(log[0].quantity, 24);
    }

    #[tokio::test]
    async fn test_sku_unique_per_shop_only() {
        let f = fixture().await;
        product(&f.db, &f.shop, "COKE-330", 1, 150).await;
        // Same SKU in another shop is fine
        product(&f.db, &f.other_shop, "COKE-330", 1, 150).await;

        let err = f
            .db
            .products()
            .create(
                &f.shop,
                NewProduct {
                    tenant_id: None,
                    sku: "COKE-330".into(),
                    barcode: None,
                    name: "Again".into(),
                    description: None,
                    category: None,
                    cost_price_cents: 0,
                    selling_price_cents: 100,
                    initial_quantity: 0,
                    reorder_level: None,
                    max_stock: None,
                    location: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_products_are_tenant_scoped() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "COKE-330", 5, 150).await;
        product(&f.db, &f.other_shop, "PEPSI-330", 5, 140).await;

        let repo = f.db.products();
        let mine = repo.list(&f.cashier.scope().unwrap(), None, false).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].sku, "COKE-330");

        assert!(matches!(
            repo.get(&f.other_shop.scope().unwrap(), &p.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(repo.list(&TenantScope::All, None, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_and_deactivate() {
        let f = fixture().await;
        let coke = product(&f.db, &f.shop, "COKE-330", 5, 150).await;
        product(&f.db, &f.shop, "WATER-500", 5, 90).await;
        let repo = f.db.products();
        let scope = f.shop.scope().unwrap();

        let hits = repo.list(&scope, Some("coke"), false).await.unwrap();
        assert_eq!(hits.len(), 1);

        repo.deactivate(&f.shop, &coke.id).await.unwrap();
        assert!(repo.list(&scope, Some("coke"), false).await.unwrap().is_empty());
        assert_eq!(repo.list(&scope, Some("coke"), true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "COKE-330", 5, 150).await;

        let updated = f
            .db
            .products()
            .update(
                &f.shop,
                &p.id,
                ProductUpdate {
                    selling_price_cents: Some(175),
                    reorder_level: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.selling_price_cents, 175);
        assert_eq!(updated.name, p.name);
        assert_eq!(updated.reorder_level, 2);

        let err = f
            .db
            .products()
            .update(&f.cashier, &p.id, ProductUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "COKE-330", 5, 150).await;
        let repo = f.db.products();

        let adjust = |kind, quantity| StockAdjustmentRequest {
            kind,
            quantity,
            notes: None,
        };

        let after = repo.adjust_stock(&f.shop, &p.id, adjust(StockAdjustment::Add, 10)).await.unwrap();
        assert_eq!(after.quantity, 15);

        let after = repo.adjust_stock(&f.shop, &p.id, adjust(StockAdjustment::Remove, 4)).await.unwrap();
        assert_eq!(after.quantity, 11);

        let err = repo
            .adjust_stock(&f.shop, &p.id, adjust(StockAdjustment::Remove, 12))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 11, requested: 12, .. })
        ));

        let after = repo.adjust_stock(&f.shop, &p.id, adjust(StockAdjustment::Set, 3)).await.unwrap();
        assert_eq!(after.quantity, 3);

        let log = repo.movements(&f.shop.scope().unwrap(), Some(&p.id), 10).await.unwrap();
        let kinds: Vec<_> = log.iter().map(|m| m.movement_type).collect();
        assert_eq!(
            kinds,
            vec![MovementType::Adjust, MovementType::Out, MovementType::In, MovementType::In]
        );

        assert!(repo
            .adjust_stock(&f.cashier, &p.id, adjust(StockAdjustment::Add, 1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_low_stock() {
        let f = fixture().await;
        product(&f.db, &f.shop, "LOW", 3, 100).await;
        product(&f.db, &f.shop, "EDGE", 10, 100).await;
        product(&f.db, &f.shop, "PLENTY", 50, 100).await;

        let low = f.db.products().low_stock(&f.shop.scope().unwrap()).await.unwrap();
        let skus: Vec<_> = low.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["LOW", "EDGE"]);
    }
}
