//! # Debt Repository
//!
//! Customer debts from credit sales and the append-only payment ledger.
//!
//! ## Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  debt_payments (append-only)          debts                             │
//! │  ┌────────────────────────┐           ┌──────────────────────────────┐  │
//! │  │ +1500  cash  10-02     │──── SUM ─►│ amount_paid_cents = 4000     │  │
//! │  │ +2500  card  10-09     │           │ amount_cents      = 6000     │  │
//! │  └────────────────────────┘           └──────────────────────────────┘  │
//! │                                                                         │
//! │  amount_paid is always re-summed from the ledger, never incremented,   │
//! │  and status (pending/partial/paid/overdue) is computed on read.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shopdesk_core::debt::{Debt, DebtDetail, DebtPayment, DebtStatus, DebtSummary};
use shopdesk_core::sale::PaymentMethod;
use shopdesk_core::validation::normalize_optional;
use shopdesk_core::{Actor, Money, TenantScope};

use crate::error::{DbResult, OrNotFound};
use crate::repository::begin_write;
use crate::scope::scoped_query;

const DEBT_COLUMNS: &str = "SELECT id, tenant_id, customer_id, sale_id, amount_cents, amount_paid_cents, \
     due_date, created_at, updated_at FROM debts";

/// Filters for [`DebtRepository::list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtFilter {
    /// Matched against the derived status.
    pub status: Option<DebtStatus>,
    pub customer_id: Option<String>,
}

/// A payment against a debt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDebtPayment {
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Opens the debt for a credit sale.
pub(crate) async fn create_for_sale(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    customer_id: &str,
    sale_id: &str,
    amount: Money,
    due_date: NaiveDate,
) -> DbResult<Debt> {
    let now = Utc::now();
    let debt = Debt {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        customer_id: customer_id.to_string(),
        sale_id: Some(sale_id.to_string()),
        amount_cents: amount.cents(),
        amount_paid_cents: 0,
        due_date,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO debts (id, tenant_id, customer_id, sale_id, amount_cents, amount_paid_cents, due_date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)",
    )
    .bind(&debt.id)
    .bind(&debt.tenant_id)
    .bind(&debt.customer_id)
    .bind(&debt.sale_id)
    .bind(debt.amount_cents)
    .bind(debt.due_date)
    .bind(debt.created_at)
    .bind(debt.updated_at)
    .execute(&mut *conn)
    .await?;

    debug!(debt_id = %debt.id, sale_id = %sale_id, amount_cents = debt.amount_cents, "Debt opened");
    Ok(debt)
}

/// Re-sums `amount_paid_cents` from the ledger.
async fn recompute_paid(conn: &mut SqliteConnection, debt_id: &str) -> DbResult<()> {
    sqlx::query(
        "UPDATE debts SET amount_paid_cents = \
         (SELECT COALESCE(SUM(amount_cents), 0) FROM debt_payments WHERE debt_id = ?), updated_at = ? \
         WHERE id = ?",
    )
    .bind(debt_id)
    .bind(Utc::now())
    .bind(debt_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn find_debt(conn: &mut SqliteConnection, scope: &TenantScope, id: &str) -> DbResult<Option<Debt>> {
    let mut qb = scoped_query(DEBT_COLUMNS, scope, "tenant_id");
    qb.push(" AND id = ");
    qb.push_bind(id.to_string());

    let debt = qb.build_query_as::<Debt>().fetch_optional(&mut *conn).await?;
    Ok(debt)
}

async fn payments_for(conn: &mut SqliteConnection, debt_id: &str) -> DbResult<Vec<DebtPayment>> {
    let payments = sqlx::query_as::<_, DebtPayment>(
        "SELECT id, debt_id, tenant_id, amount_cents, payment_method, notes, created_by, created_at \
         FROM debt_payments WHERE debt_id = ? ORDER BY created_at, rowid",
    )
    .bind(debt_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(payments)
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct DebtRepository {
    pool: SqlitePool,
}

impl DebtRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DebtRepository { pool }
    }

    /// Lists debts, soonest due first, with status derived as of `today`.
    pub async fn list(&self, scope: &TenantScope, today: NaiveDate, filter: DebtFilter) -> DbResult<Vec<DebtSummary>> {
        let mut qb = scoped_query(DEBT_COLUMNS, scope, "tenant_id");
        if let Some(customer_id) = filter.customer_id {
            qb.push(" AND customer_id = ");
            qb.push_bind(customer_id);
        }
        qb.push(" ORDER BY due_date, created_at");

        let debts = qb.build_query_as::<Debt>().fetch_all(&self.pool).await?;
        let summaries: Vec<DebtSummary> = debts
            .into_iter()
            .map(|d| d.summarize(today))
            .filter(|s| filter.status.map_or(true, |wanted| s.status == wanted))
            .collect();

        debug!(count = summaries.len(), "Listed debts");
        Ok(summaries)
    }

    /// Gets a debt with its payment history.
    pub async fn get(&self, scope: &TenantScope, id: &str, today: NaiveDate) -> DbResult<DebtDetail> {
        let mut conn = self.pool.acquire().await?;
        let debt = find_debt(&mut conn, scope, id).await?.or_not_found("Debt", id)?;
        let payments = payments_for(&mut conn, &debt.id).await?;
        Ok(DebtDetail {
            summary: debt.summarize(today),
            payments,
        })
    }

    /// Records a payment against a debt.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` for zero or negative amounts
    /// - `Validation` when paying a debt "on credit"
    /// - `PaymentExceedsBalance` when the amount is above what is owed
    pub async fn record_payment(&self, actor: &Actor, debt_id: &str, payment: NewDebtPayment) -> DbResult<DebtDetail> {
        let scope = actor.scope()?;
        let amount = Money::from_cents(payment.amount_cents);

        let mut tx = begin_write(&self.pool).await?;
        let debt = find_debt(&mut tx, &scope, debt_id).await?.or_not_found("Debt", debt_id)?;
        debt.check_payment(amount, payment.payment_method)?;

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO debt_payments (id, debt_id, tenant_id, amount_cents, payment_method, notes, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&debt.id)
        .bind(&debt.tenant_id)
        .bind(amount.cents())
        .bind(payment.payment_method)
        .bind(normalize_optional(payment.notes))
        .bind(&actor.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        recompute_paid(&mut tx, &debt.id).await?;

        let debt = find_debt(&mut tx, &scope, &debt.id).await?.or_not_found("Debt", debt_id)?;
        let payments = payments_for(&mut tx, &debt.id).await?;
        tx.commit().await?;

        let summary = debt.summarize(now.date_naive());
        info!(
            debt_id = %summary.debt.id,
            amount_cents = amount.cents(),
            balance_cents = summary.balance_cents,
            status = summary.status.as_str(),
            "Debt payment recorded"
        );

        Ok(DebtDetail { summary, payments })
    }

    /// Re-derives `amount_paid` from the payment ledger.
    ///
    /// Idempotent; used to repair a row written by anything other than
    /// [`DebtRepository::record_payment`].
    pub async fn recompute(&self, scope: &TenantScope, id: &str) -> DbResult<Debt> {
        let mut tx = begin_write(&self.pool).await?;
        let before = find_debt(&mut tx, scope, id).await?.or_not_found("Debt", id)?;
        recompute_paid(&mut tx, &before.id).await?;
        let after = find_debt(&mut tx, scope, id).await?.or_not_found("Debt", id)?;
        tx.commit().await?;

        if before.amount_paid_cents != after.amount_paid_cents {
            warn!(
                debt_id = %after.id,
                stored = before.amount_paid_cents,
                ledger = after.amount_paid_cents,
                "Debt amount_paid drifted from ledger"
            );
        }
        Ok(after)
    }

    /// Sum of unpaid balances.
    pub async fn outstanding_total(&self, scope: &TenantScope) -> DbResult<Money> {
        let mut qb = scoped_query(
            "SELECT COALESCE(SUM(amount_cents - amount_paid_cents), 0) FROM debts",
            scope,
            "tenant_id",
        );
        qb.push(" AND amount_paid_cents < amount_cents");

        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(Money::from_cents(total))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
