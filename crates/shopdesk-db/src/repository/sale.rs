//! # Sale Repository
//!
//! Processing, listing and deleting point-of-sale transactions.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    process(actor, NewSale)                              │
//! │                                                                         │
//! │  validate lines, merge duplicates, credit needs a customer              │
//! │       │                                                                 │
//! │  BEGIN ▼                                                                │
//! │  ├── customer must belong to the sale's shop                            │
//! │  ├── load each product in the shop (must be active)                     │
//! │  ├── SaleTotals::compute → settle (tendered / change)                   │
//! │  ├── credit: available credit must cover the total                      │
//! │  ├── INSERT sale                                                        │
//! │  ├── per line: conditional stock decrement → item → 'out' movement      │
//! │  └── credit: INSERT debt (due = today + credit_term_days)               │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error drops the transaction: no sale, no items, stock untouched.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Revenue is not written here; reports aggregate the sales table, so a
//! deleted sale disappears from revenue as well.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use shopdesk_core::numbering::sale_number;
use shopdesk_core::sale::{
    merge_lines, sale_line_total, settle, validate_sale_lines, PaymentMethod, Sale, SaleDetail, SaleItem,
    SaleLine, SaleStatus, SaleTotals,
};
use shopdesk_core::validation::{normalize_optional, validate_amount_cents, validate_rate_bps};
use shopdesk_core::{
    Actor, BusinessRules, CoreError, Money, MovementType, Percent, Permission, Product, TenantScope,
    ValidationError,
};

use crate::error::{DbResult, OrNotFound};
use crate::repository::begin_write;
use crate::repository::customer::{credit_for, find_customer};
use crate::repository::debt::create_for_sale;
use crate::repository::product::{decrement_stock, find_product, record_movement, restore_stock, NewMovement};
use crate::scope::{scoped_query, TenantFilter};

const SALE_COLUMNS: &str = "SELECT id, tenant_id, sale_number, customer_id, payment_method, status, \
     subtotal_cents, tax_amount_cents, discount_amount_cents, total_amount_cents, amount_paid_cents, \
     amount_tendered_cents, change_amount_cents, notes, created_by, created_at FROM sales";

const DEFAULT_LIST_LIMIT: u32 = 200;

/// A sale as rung up at the till.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    /// Shop the sale belongs to; site admins must set it.
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<SaleLine>,
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub discount_cents: i64,
    /// Cash handed over; only meaningful for cash sales.
    #[serde(default)]
    pub amount_tendered_cents: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filters for [`SaleRepository::list`]. Dates are inclusive calendar days (UTC).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub customer_id: Option<String>,
    pub limit: Option<u32>,
}

/// Loads a sale the actor may see: in scope and, for cashiers, their own.
async fn find_sale(conn: &mut SqliteConnection, actor: &Actor, id: &str) -> DbResult<Option<Sale>> {
    let scope = actor.scope()?;
    let mut qb = scoped_query(SALE_COLUMNS, &scope, "tenant_id");
    qb.push_own_rows_filter(actor, "created_by");
    qb.push(" AND id = ");
    qb.push_bind(id.to_string());

    let sale = qb.build_query_as::<Sale>().fetch_optional(&mut *conn).await?;
    Ok(sale)
}

async fn sale_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        "SELECT id, sale_id, product_id, sku_snapshot, name_snapshot, quantity, unit_price_cents, \
         unit_cost_cents, total_price_cents FROM sale_items WHERE sale_id = ? ORDER BY rowid",
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    rules: BusinessRules,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, rules: BusinessRules) -> Self {
        SaleRepository { pool, rules }
    }

    /// Processes a sale in one transaction.
    ///
    /// ## Errors
    /// - `Validation` for empty, oversized or malformed lines, or a credit
    ///   sale without a customer
    /// - `NotFound` for a customer or product outside the sale's shop
    /// - `InsufficientStock` when any line cannot be covered
    /// - `InvalidPaymentAmount` when cash tendered is below the total
    /// - `CreditLimitExceeded` for a credit sale over the available credit
    pub async fn process(&self, actor: &Actor, request: NewSale) -> DbResult<SaleDetail> {
        actor.require(Permission::CreateSales)?;
        let tenant_id = actor.write_tenant(request.tenant_id.as_deref())?;

        let rules = &self.rules;
        validate_sale_lines(&request.items, rules.max_sale_lines, rules.max_line_quantity)?;
        let lines = merge_lines(request.items);
        validate_sale_lines(&lines, rules.max_sale_lines, rules.max_line_quantity)?;
        validate_rate_bps("tax_rate", request.tax_rate_bps)?;
        validate_amount_cents("discount", request.discount_cents)?;
        if let Some(tendered) = request.amount_tendered_cents {
            validate_amount_cents("amount_tendered", tendered)?;
        }

        let customer_id = normalize_optional(request.customer_id);
        if request.payment_method == PaymentMethod::Credit && customer_id.is_none() {
            return Err(ValidationError::required("customer_id").into());
        }

        let scope = TenantScope::Tenant(tenant_id.clone());
        let mut tx = begin_write(&self.pool).await?;

        let customer = match &customer_id {
            Some(id) => Some(find_customer(&mut tx, &scope, id).await?.or_not_found("Customer", id)?),
            None => None,
        };

        // Resolve every product before writing anything
        let mut priced: Vec<(SaleLine, Product, Money)> = Vec::with_capacity(lines.len());
        for line in lines {
            let product = find_product(&mut tx, &scope, &line.product_id)
                .await?
                .or_not_found("Product", &line.product_id)?;
            if !product.is_active {
                return Err(CoreError::invalid_state("Product", &product.sku, "inactive", "sell").into());
            }
            let line_total = sale_line_total(line.quantity, product.selling_price())?;
            priced.push((line, product, line_total));
        }

        let subtotal = Money::checked_sum(priced.iter().map(|(_, _, total)| *total))
            .ok_or_else(|| CoreError::overflow("sale subtotal"))?;
        let totals = SaleTotals::compute(
            subtotal,
            Percent::from_bps(request.tax_rate_bps),
            Money::from_cents(request.discount_cents),
        )?;
        let settlement = settle(
            request.payment_method,
            totals.total(),
            request.amount_tendered_cents.map(Money::from_cents),
        )?;

        if request.payment_method == PaymentMethod::Credit {
            if let Some(customer) = &customer {
                let credit = credit_for(&mut tx, &customer.id, customer.credit_limit()).await?;
                credit.ensure_covers(&customer.id, totals.total())?;
            }
        }

        let now = Utc::now();
        let today = now.date_naive();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            sale_number: sale_number(today, Uuid::new_v4()),
            customer_id,
            payment_method: request.payment_method,
            status: SaleStatus::Completed,
            subtotal_cents: totals.subtotal_cents,
            tax_amount_cents: totals.tax_amount_cents,
            discount_amount_cents: totals.discount_amount_cents,
            total_amount_cents: totals.total_amount_cents,
            amount_paid_cents: settlement.amount_paid.cents(),
            amount_tendered_cents: settlement.amount_tendered.map(|m| m.cents()),
            change_amount_cents: settlement.change.cents(),
            notes: normalize_optional(request.notes),
            created_by: actor.user_id.clone(),
            created_at: now,
        };

        debug!(sale_number = %sale.sale_number, lines = priced.len(), "Inserting sale");

        sqlx::query(
            "INSERT INTO sales (id, tenant_id, sale_number, customer_id, payment_method, status, subtotal_cents, \
             tax_amount_cents, discount_amount_cents, total_amount_cents, amount_paid_cents, amount_tendered_cents, \
             change_amount_cents, notes, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.sale_number)
        .bind(&sale.customer_id)
        .bind(sale.payment_method)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_amount_cents)
        .bind(sale.discount_amount_cents)
        .bind(sale.total_amount_cents)
        .bind(sale.amount_paid_cents)
        .bind(sale.amount_tendered_cents)
        .bind(sale.change_amount_cents)
        .bind(&sale.notes)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(priced.len());
        for (line, product, line_total) in priced {
            decrement_stock(&mut tx, &product.id, &product.sku, line.quantity).await?;

            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                quantity: line.quantity,
                unit_price_cents: product.selling_price_cents,
                unit_cost_cents: product.cost_price_cents,
                total_price_cents: line_total.cents(),
            };

            sqlx::query(
                "INSERT INTO sale_items (id, sale_id, product_id, sku_snapshot, name_snapshot, quantity, \
                 unit_price_cents, unit_cost_cents, total_price_cents) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.unit_cost_cents)
            .bind(item.total_price_cents)
            .execute(&mut *tx)
            .await?;

            record_movement(
                &mut tx,
                NewMovement {
                    tenant_id: &sale.tenant_id,
                    product_id: &product.id,
                    movement_type: MovementType::Out,
                    quantity: line.quantity,
                    reference: Some(&sale.sale_number),
                    notes: None,
                    created_by: &actor.user_id,
                },
            )
            .await?;

            items.push(item);
        }

        if sale.payment_method == PaymentMethod::Credit {
            if let Some(customer_id) = &sale.customer_id {
                let due = today + Duration::days(rules.credit_term_days);
                create_for_sale(&mut tx, &sale.tenant_id, customer_id, &sale.id, sale.total(), due).await?;
            }
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            sale_number = %sale.sale_number,
            tenant_id = %sale.tenant_id,
            total_cents = sale.total_amount_cents,
            method = sale.payment_method.as_str(),
            "Sale completed"
        );

        Ok(SaleDetail { sale, items })
    }

    /// Lists sales newest first. Cashiers only see sales they rang up.
    pub async fn list(&self, actor: &Actor, filter: SaleFilter) -> DbResult<Vec<Sale>> {
        let scope = actor.scope()?;
        let mut qb = scoped_query(SALE_COLUMNS, &scope, "tenant_id");
        qb.push_own_rows_filter(actor, "created_by");

        if let Some(from) = filter.from {
            qb.push(" AND date(created_at) >= ");
            qb.push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND date(created_at) <= ");
            qb.push_bind(to);
        }
        if let Some(method) = filter.payment_method {
            qb.push(" AND payment_method = ");
            qb.push_bind(method);
        }
        if let Some(customer_id) = filter.customer_id {
            qb.push(" AND customer_id = ");
            qb.push_bind(customer_id);
        }

        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(i64::from(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)));

        let sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;
        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Gets a sale with its items, under the same visibility as `list`.
    pub async fn get(&self, actor: &Actor, id: &str) -> DbResult<SaleDetail> {
        let mut conn = self.pool.acquire().await?;
        let sale = find_sale(&mut conn, actor, id).await?.or_not_found("Sale", id)?;
        let items = sale_items(&mut conn, &sale.id).await?;
        Ok(SaleDetail { sale, items })
    }

    /// Deletes a sale and puts its stock back.
    ///
    /// `confirmation` must repeat the sale number. Items, the debt of a
    /// credit sale and that debt's payments go with the sale.
    pub async fn delete(&self, actor: &Actor, id: &str, confirmation: &str) -> DbResult<()> {
        actor.require(Permission::DeleteSales)?;

        let mut tx = begin_write(&self.pool).await?;
        let sale = find_sale(&mut tx, actor, id).await?.or_not_found("Sale", id)?;
        sale.confirm(confirmation)?;

        let items = sale_items(&mut tx, &sale.id).await?;
        for item in &items {
            restore_stock(&mut tx, &item.product_id, item.quantity).await?;
            record_movement(
                &mut tx,
                NewMovement {
                    tenant_id: &sale.tenant_id,
                    product_id: &item.product_id,
                    movement_type: MovementType::Return,
                    quantity: item.quantity,
                    reference: Some(&sale.sale_number),
                    notes: Some("Sale deleted"),
                    created_by: &actor.user_id,
                },
            )
            .await?;
        }

        sqlx::query("DELETE FROM sales WHERE id = ?")
            .bind(&sale.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(sale_id = %sale.id, sale_number = %sale.sale_number, restored_lines = items.len(), "Sale deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::customer::NewCustomer;
    use crate::testing::{fixture, fixture_with, product, today};
    use crate::DbConfig;
    use shopdesk_core::validation::MAX_AMOUNT_CENTS;

    fn line(product_id: &str, quantity: i64) -> SaleLine {
        SaleLine {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    fn cash_sale(items: Vec<SaleLine>) -> NewSale {
        NewSale {
            tenant_id: None,
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            items,
            tax_rate_bps: 0,
            discount_cents: 0,
            amount_tendered_cents: None,
            notes: None,
        }
    }

    async fn stock_of(f: &crate::testing::Fixture, id: &str) -> i64 {
        f.db.products().get(&TenantScope::All, id).await.unwrap().quantity
    }

    #[tokio::test]
    async fn test_cash_sale_with_change() {
        let f = fixture().await;
        let coke = product(&f.db, &f.shop, "COKE-330", 10, 150).await;

        let mut req = cash_sale(vec![line(&coke.id, 3)]);
        req.amount_tendered_cents = Some(500);
        let detail = f.db.sales().process(&f.cashier, req).await.unwrap();

        assert_eq!(detail.sale.total_amount_cents, 450);
        assert_eq!(detail.sale.subtotal_cents, 450);
        assert_eq!(detail.sale.amount_paid_cents, 450);
        assert_eq!(detail.sale.change_amount_cents, 50);
        assert_eq!(detail.sale.status, SaleStatus::Completed);
        assert!(detail.sale.sale_number.starts_with("SALE-"));
        assert_eq!(detail.items[0].unit_cost_cents, 75);
        assert_eq!(stock_of(&f, &coke.id).await, 7);

        let log = f.db.products().movements(&TenantScope::All, Some(&coke.id), 1).await.unwrap();
        assert_eq!(log[0].movement_type, MovementType::Out);
        assert_eq!(log[0].reference.as_deref(), Some(detail.sale.sale_number.as_str()));
    }

    #[tokio::test]
    async fn test_tax_and_discount() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "TV", 2, 10_000).await;

        let mut req = cash_sale(vec![line(&p.id, 1)]);
        req.tax_rate_bps = 1600;
        req.discount_cents = 600;
        let detail = f.db.sales().process(&f.shop, req).await.unwrap();
        assert_eq!(detail.sale.tax_amount_cents, 1_600);
        assert_eq!(detail.sale.total_amount_cents, 11_000);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_merged() {
        let f = fixture().await;
        let coke = product(&f.db, &f.shop, "COKE-330", 10, 150).await;

        let detail = f
            .db
            .sales()
            .process(&f.shop, cash_sale(vec![line(&coke.id, 2), line(&coke.id, 3)]))
            .await
            .unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].quantity, 5);
        assert_eq!(stock_of(&f, &coke.id).await, 5);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let f = fixture().await;
        let coke = product(&f.db, &f.shop, "COKE-330", 10, 150).await;
        let water = product(&f.db, &f.shop, "WATER-500", 1, 90).await;

        let err = f
            .db
            .sales()
            .process(&f.shop, cash_sale(vec![line(&coke.id, 4), line(&water.id, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));

        assert_eq!(stock_of(&f, &coke.id).await, 10);
        assert_eq!(stock_of(&f, &water.id).await, 1);
        assert!(f.db.sales().list(&f.shop, SaleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_line_limits() {
        let f = fixture().await;
        let coke = product(&f.db, &f.shop, "COKE-330", 2000, 150).await;
        let sales = f.db.sales();

        assert!(sales.process(&f.shop, cash_sale(vec![])).await.is_err());
        assert!(sales.process(&f.shop, cash_sale(vec![line(&coke.id, 0)])).await.is_err());
        assert!(sales.process(&f.shop, cash_sale(vec![line(&coke.id, 1000)])).await.is_err());
        // 600 + 600 merges past the per-line maximum
        assert!(sales
            .process(&f.shop, cash_sale(vec![line(&coke.id, 600), line(&coke.id, 600)]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_huge_amounts_are_refused_not_overflowed() {
        let f = fixture().await;

        let err = f
            .db
            .products()
            .create(
                &f.shop,
                crate::NewProduct {
                    tenant_id: None,
                    sku: "GOLD".into(),
                    barcode: None,
                    name: "Gold bar".into(),
                    description: None,
                    category: None,
                    cost_price_cents: 0,
                    selling_price_cents: i64::MAX / 2,
                    initial_quantity: 10,
                    reorder_level: None,
                    max_stock: None,
                    location: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        // Largest accepted price still cannot be multiplied past one line's maximum
        let gold = product(&f.db, &f.shop, "GOLD", 10, MAX_AMOUNT_CENTS).await;
        let err = f
            .db
            .sales()
            .process(&f.shop, cash_sale(vec![line(&gold.id, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::AmountOverflow { .. })));
        assert_eq!(stock_of(&f, &gold.id).await, 10);

        let mut req = cash_sale(vec![line(&gold.id, 1)]);
        req.discount_cents = i64::MAX;
        assert!(f.db.sales().process(&f.shop, req).await.is_err());
        assert_eq!(stock_of(&f, &gold.id).await, 10);
    }

    #[tokio::test]
    async fn test_product_of_other_shop_is_not_found() {
        let f = fixture().await;
        let theirs = product(&f.db, &f.other_shop, "PEPSI", 10, 100).await;

        let err = f
            .db
            .sales()
            .process(&f.shop, cash_sale(vec![line(&theirs.id, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(stock_of(&f, &theirs.id).await, 10);
    }

    #[tokio::test]
    async fn test_credit_sale_creates_debt() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "RICE-5KG", 10, 2_000).await;
        let customer = f
            .db
            .customers()
            .create(
                &f.shop,
                NewCustomer {
                    name: "Ann".into(),
                    credit_limit_cents: 5_000,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut req = cash_sale(vec![line(&p.id, 2)]);
        req.payment_method = PaymentMethod::Credit;
        req.customer_id = Some(customer.id.clone());
        let detail = f.db.sales().process(&f.cashier, req.clone()).await.unwrap();
        assert_eq!(detail.sale.amount_paid_cents, 0);

        let scope = f.shop.scope().unwrap();
        let debts = f.db.debts().list(&scope, today(), Default::default()).await.unwrap();
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].debt.amount_cents, 4_000);
        assert_eq!(debts[0].debt.sale_id.as_deref(), Some(detail.sale.id.as_str()));
        assert_eq!(debts[0].debt.due_date, today() + Duration::days(30));

        // 4000 owed of 5000: another 4000 does not fit
        let err = f.db.sales().process(&f.cashier, req).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::CreditLimitExceeded { available_cents: 1_000, .. })
        ));
        assert_eq!(stock_of(&f, &p.id).await, 8);
    }

    #[tokio::test]
    async fn test_credit_sale_needs_customer() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "RICE-5KG", 10, 2_000).await;
        let mut req = cash_sale(vec![line(&p.id, 1)]);
        req.payment_method = PaymentMethod::Credit;

        let err = f.db.sales().process(&f.shop, req).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cashier_sees_only_own_sales() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "COKE-330", 10, 150).await;
        let by_admin = f.db.sales().process(&f.shop, cash_sale(vec![line(&p.id, 1)])).await.unwrap();
        let by_cashier = f.db.sales().process(&f.cashier, cash_sale(vec![line(&p.id, 1)])).await.unwrap();

        let sales = f.db.sales();
        let mine = sales.list(&f.cashier, SaleFilter::default()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, by_cashier.sale.id);
        assert!(matches!(
            sales.get(&f.cashier, &by_admin.sale.id).await,
            Err(DbError::NotFound { .. })
        ));

        assert_eq!(sales.list(&f.shop, SaleFilter::default()).await.unwrap().len(), 2);
        assert!(sales.list(&f.other_shop, SaleFilter::default()).await.unwrap().is_empty());
        assert!(matches!(
            sales.get(&f.other_shop, &by_admin.sale.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "COKE-330", 10, 150).await;
        f.db.sales().process(&f.shop, cash_sale(vec![line(&p.id, 1)])).await.unwrap();
        let mut card = cash_sale(vec![line(&p.id, 1)]);
        card.payment_method = PaymentMethod::Card;
        f.db.sales().process(&f.shop, card).await.unwrap();

        let only_card = SaleFilter {
            payment_method: Some(PaymentMethod::Card),
            ..Default::default()
        };
        assert_eq!(f.db.sales().list(&f.shop, only_card).await.unwrap().len(), 1);

        let today_only = SaleFilter {
            from: Some(today()),
            to: Some(today()),
            ..Default::default()
        };
        assert_eq!(f.db.sales().list(&f.shop, today_only).await.unwrap().len(), 2);

        let yesterday = SaleFilter {
            to: Some(today() - Duration::days(1)),
            ..Default::default()
        };
        assert!(f.db.sales().list(&f.shop, yesterday).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_restores_stock() {
        let f = fixture().await;
        let coke = product(&f.db, &f.shop, "COKE-330", 20, 150).await;
        let sales = f.db.sales();

        let mut numbers = Vec::new();
        for qty in [1, 4, 7] {
            let d = sales.process(&f.cashier, cash_sale(vec![line(&coke.id, qty)])).await.unwrap();
            numbers.push((d.sale.id, d.sale.sale_number));
        }
        assert_eq!(stock_of(&f, &coke.id).await, 8);

        let (id, number) = &numbers[0];
        assert!(matches!(
            sales.delete(&f.cashier, id, number).await,
            Err(DbError::Core(CoreError::PermissionDenied { .. }))
        ));
        assert!(matches!(
            sales.delete(&f.shop, id, "SALE-WRONG").await,
            Err(DbError::Core(CoreError::ConfirmationMismatch { .. }))
        ));

        for (id, number) in &numbers {
            sales.delete(&f.shop, id, number).await.unwrap();
        }
        assert_eq!(stock_of(&f, &coke.id).await, 20);
        assert!(sales.list(&f.shop, SaleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_credit_sale_removes_debt() {
        let f = fixture().await;
        let p = product(&f.db, &f.shop, "RICE-5KG", 10, 2_000).await;
        let customer = f
            .db
            .customers()
            .create(
                &f.shop,
                NewCustomer {
                    name: "Ann".into(),
                    credit_limit_cents: 50_000,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut req = cash_sale(vec![line(&p.id, 1)]);
        req.payment_method = PaymentMethod::Credit;
        req.customer_id = Some(customer.id.clone());
        let d = f.db.sales().process(&f.shop, req).await.unwrap();

        f.db.sales().delete(&f.shop, &d.sale.id, &d.sale.sale_number).await.unwrap();

        let scope = f.shop.scope().unwrap();
        assert!(f.db.debts().list(&scope, today(), Default::default()).await.unwrap().is_empty());
        let credit = f.db.customers().credit(&scope, &customer.id).await.unwrap();
        assert_eq!(credit.total_debt_cents, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_on_file_database() {
        let path = std::env::temp_dir().join(format!("shopdesk-sales-{}.db", Uuid::new_v4()));
        let f = fixture_with(DbConfig::new(&path).max_connections(8)).await;

        let shared = product(&f.db, &f.shop, "SHARED", 40, 100).await;
        let mut own = Vec::new();
        for i in 0..16 {
            own.push(product(&f.db, &f.shop, &format!("OWN-{}", i), 5, 100).await);
        }

        let mut handles = Vec::new();
        for p in &own {
            let db = f.db.clone();
            let cashier = f.cashier.clone();
            let lines = vec![line(&shared.id, 2), line(&p.id, 1)];
            handles.push(tokio::spawn(async move {
                db.sales().process(&cashier, cash_sale(lines)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(stock_of(&f, &shared.id).await, 40 - 2 * 16);
        for p in &own {
            assert_eq!(stock_of(&f, &p.id).await, 4);
        }
        assert_eq!(f.db.sales().list(&f.shop, SaleFilter::default()).await.unwrap().len(), 16);

        f.db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
