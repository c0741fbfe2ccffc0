//! # Report Repository
//!
//! Revenue and dashboard figures. Nothing here is stored: every number is
//! aggregated from sales, stock, debts and invoices when asked for.
//!
//! ```text
//! sales ──GROUP BY tenant_id, date(created_at)──► DailyRevenue rows
//!   └── sale_items (quantity × (price − cost)) ──► profit_cents
//! ```

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use shopdesk_core::report::{DailyRevenue, RevenueTotals, SalesSummary, ShopDashboard};
use shopdesk_core::{Actor, Permission, ValidationError};

use crate::error::DbResult;
use crate::repository::debt::DebtRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::scope::{scoped_query, TenantFilter};

const DAILY_REVENUE_SELECT: &str = "SELECT s.tenant_id, date(s.created_at) AS day, \
     COUNT(*) AS transaction_count, \
     SUM(s.total_amount_cents) AS total_cents, \
     SUM(CASE WHEN s.payment_method = 'cash' THEN s.total_amount_cents ELSE 0 END) AS cash_cents, \
     SUM(CASE WHEN s.payment_method = 'card' THEN s.total_amount_cents ELSE 0 END) AS card_cents, \
     SUM(CASE WHEN s.payment_method = 'mobile' THEN s.total_amount_cents ELSE 0 END) AS mobile_cents, \
     SUM(CASE WHEN s.payment_method = 'bank' THEN s.total_amount_cents ELSE 0 END) AS bank_cents, \
     SUM(CASE WHEN s.payment_method = 'credit' THEN s.total_amount_cents ELSE 0 END) AS credit_cents, \
     SUM(s.tax_amount_cents) AS tax_cents, \
     SUM(s.discount_amount_cents) AS discount_cents, \
     SUM((SELECT COALESCE(SUM(i.quantity * (i.unit_price_cents - i.unit_cost_cents)), 0) \
          FROM sale_items i WHERE i.sale_id = s.id)) AS profit_cents \
     FROM sales s";

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Completed sales per tenant and day in `[from, to]`.
    ///
    /// Cashiers only see the sales they rang up.
    pub async fn daily_revenue(&self, actor: &Actor, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailyRevenue>> {
        if to < from {
            return Err(ValidationError::InvalidFormat {
                field: "to".to_string(),
                reason: format!("{} is before {}", to, from),
            }
            .into());
        }
        let scope = actor.scope()?;

        let mut qb = scoped_query(DAILY_REVENUE_SELECT, &scope, "s.tenant_id");
        qb.push_own_rows_filter(actor, "s.created_by");
        qb.push(" AND s.status = 'completed' AND date(s.created_at) >= ");
        qb.push_bind(from);
        qb.push(" AND date(s.created_at) <= ");
        qb.push_bind(to);
        qb.push(" GROUP BY s.tenant_id, date(s.created_at) ORDER BY day, s.tenant_id");

        let days = qb.build_query_as::<DailyRevenue>().fetch_all(&self.pool).await?;
        debug!(user = %actor.username, %from, %to, days = days.len(), "Daily revenue computed");
        Ok(days)
    }

    /// Revenue by day plus grand totals.
    pub async fn sales_summary(&self, actor: &Actor, from: NaiveDate, to: NaiveDate) -> DbResult<SalesSummary> {
        let days = self.daily_revenue(actor, from, to).await?;
        Ok(SalesSummary::new(from.to_string(), to.to_string(), days))
    }

    /// Landing page figures: today's sales, reorder count, open debt and
    /// the invoice dashboard.
    pub async fn shop_dashboard(&self, actor: &Actor, today: NaiveDate) -> DbResult<ShopDashboard> {
        actor.require(Permission::ViewReports)?;
        let scope = actor.scope()?;

        let today_sales = RevenueTotals::from_days(&self.daily_revenue(actor, today, today).await?);

        let mut qb = scoped_query(
            "SELECT COUNT(*) FROM products p JOIN stock s ON s.product_id = p.id",
            &scope,
            "p.tenant_id",
        );
        qb.push(" AND p.is_active = 1 AND s.quantity <= s.reorder_level");
        let products_to_reorder: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;

        let outstanding = DebtRepository::new(self.pool.clone()).outstanding_total(&scope).await?;
        let invoices = InvoiceRepository::new(self.pool.clone()).dashboard(&scope, today).await?;

        Ok(ShopDashboard {
            today: today_sales,
            products_to_reorder,
            outstanding_debt_cents: outstanding.cents(),
            invoices,
        })
    }
}
