//! # Invoice Repository
//!
//! Invoices with line items, a monthly per-shop number sequence and an
//! append-only payment ledger.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every write, one transaction                                           │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    load invoice inside the actor's scope   (NotFound otherwise)         │
//! │    lifecycle guard                         (InvalidState)               │
//! │    change items / header / ledger                                       │
//! │    save_totals:                                                         │
//! │      subtotal    = SUM(invoice_items.total_price_cents)                 │
//! │      tax, total  = InvoiceTotals::compute(subtotal, rate, discount)     │
//! │      amount_paid = SUM(invoice_payments.amount_cents)                   │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Numbering
//! `invoice_sequences` holds one counter per (shop, YYYYMM). The counter is
//! bumped with a single upsert inside the create transaction, so a rolled
//! back create does not consume a number.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use shopdesk_core::invoice::{
    invoice_line_total, validate_invoice_line, Invoice, InvoiceDashboard, InvoiceDetail, InvoiceItem,
    InvoiceLifecycle, InvoicePayment, InvoicePaymentMethod, InvoiceStatus, InvoiceSummary, InvoiceTotals,
};
use shopdesk_core::numbering::{invoice_number, invoice_period, share_token};
use shopdesk_core::validation::{normalize_optional, validate_amount_cents, validate_rate_bps};
use shopdesk_core::{Actor, Money, Percent, Permission, TenantScope, ValidationError};

use crate::error::{on_duplicate, DbError, DbResult, OrNotFound};
use crate::repository::begin_write;
use crate::repository::customer::find_customer;
use crate::repository::product::find_product;
use crate::scope::scoped_query;

const INVOICE_COLUMNS: &str = "SELECT id, tenant_id, invoice_number, customer_id, issue_date, due_date, lifecycle, \
     subtotal_cents, tax_rate_bps, tax_amount_cents, discount_amount_cents, total_amount_cents, amount_paid_cents, \
     notes, payment_terms, share_token, created_by, created_at, updated_at FROM invoices";

// =============================================================================
// Request Types
// =============================================================================

/// One line on a new or draft invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub product_id: String,
    /// Defaults to the product name.
    #[serde(default)]
    pub description: Option<String>,
    /// Hundredths of a unit.
    pub quantity: i64,
    /// Defaults to the product's selling price.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
    #[serde(default)]
    pub discount_rate_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    /// Owning shop; site admins must set it.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub customer_id: String,
    /// Defaults to today.
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub items: Vec<NewInvoiceItem>,
}

/// Header changes on a draft; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceUpdate {
    pub due_date: Option<NaiveDate>,
    pub tax_rate_bps: Option<u32>,
    pub discount_cents: Option<i64>,
    pub notes: Option<String>,
    pub payment_terms: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoicePayment {
    pub amount_cents: i64,
    pub payment_method: InvoicePaymentMethod,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filters for [`InvoiceRepository::list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceFilter {
    /// Matched against the derived status.
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<String>,
}

fn check_dates(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), ValidationError> {
    if due_date < issue_date {
        return Err(ValidationError::InvalidFormat {
            field: "due_date".to_string(),
            reason: format!("{} is before the issue date {}", due_date, issue_date),
        });
    }
    Ok(())
}

// =============================================================================
// Shared Helpers
// =============================================================================

async fn find_invoice(conn: &mut SqliteConnection, scope: &TenantScope, id: &str) -> DbResult<Option<Invoice>> {
    let mut qb = scoped_query(INVOICE_COLUMNS, scope, "tenant_id");
    qb.push(" AND id = ");
    qb.push_bind(id.to_string());

    let invoice = qb.build_query_as::<Invoice>().fetch_optional(&mut *conn).await?;
    Ok(invoice)
}

async fn load_invoice(conn: &mut SqliteConnection, scope: &TenantScope, id: &str) -> DbResult<Invoice> {
    find_invoice(conn, scope, id).await?.or_not_found("Invoice", id)
}

async fn payment_count(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_payments WHERE invoice_id = ?")
        .bind(invoice_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Bumps the (tenant, month) counter and returns the new value.
async fn next_sequence(conn: &mut SqliteConnection, tenant_id: &str, period: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        "INSERT INTO invoice_sequences (tenant_id, period, last_value) VALUES (?, ?, 1) \
         ON CONFLICT (tenant_id, period) DO UPDATE SET last_value = last_value + 1 \
         RETURNING last_value",
    )
    .bind(tenant_id)
    .bind(period)
    .fetch_one(&mut *conn)
    .await?;
    Ok(value)
}

/// Inserts one line. The product must belong to the invoice's shop.
async fn insert_item(conn: &mut SqliteConnection, invoice: &Invoice, item: NewInvoiceItem) -> DbResult<InvoiceItem> {
    let tenant = TenantScope::Tenant(invoice.tenant_id.clone());
    let product = find_product(conn, &tenant, &item.product_id)
        .await?
        .or_not_found("Product", &item.product_id)?;

    let unit_price = Money::from_cents(item.unit_price_cents.unwrap_or(product.selling_price_cents));
    let discount_rate = Percent::from_bps(item.discount_rate_bps);
    validate_invoice_line(item.quantity, unit_price, discount_rate)?;

    let line = InvoiceItem {
        id: Uuid::new_v4().to_string(),
        invoice_id: invoice.id.clone(),
        product_id: product.id.clone(),
        description: normalize_optional(item.description).unwrap_or(product.name),
        quantity: item.quantity,
        unit_price_cents: unit_price.cents(),
        discount_rate_bps: discount_rate.bps(),
        total_price_cents: invoice_line_total(item.quantity, unit_price, discount_rate)?.cents(),
    };

    sqlx::query(
        "INSERT INTO invoice_items (id, invoice_id, product_id, description, quantity, unit_price_cents, \
         discount_rate_bps, total_price_cents) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&line.id)
    .bind(&line.invoice_id)
    .bind(&line.product_id)
    .bind(&line.description)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.discount_rate_bps)
    .bind(line.total_price_cents)
    .execute(&mut *conn)
    .await
    .map_err(on_duplicate("product_id", &line.product_id))?;

    Ok(line)
}

/// Rewrites the stored amounts from items and payments.
async fn save_totals(conn: &mut SqliteConnection, invoice: Invoice) -> DbResult<Invoice> {
    let subtotal: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(total_price_cents), 0) FROM invoice_items WHERE invoice_id = ?")
            .bind(&invoice.id)
            .fetch_one(&mut *conn)
            .await?;
    let paid: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM invoice_payments WHERE invoice_id = ?")
        .bind(&invoice.id)
        .fetch_one(&mut *conn)
        .await?;

    let totals = InvoiceTotals::compute(
        Money::from_cents(subtotal),
        invoice.tax_rate(),
        Money::from_cents(invoice.discount_amount_cents),
    )?;

    let saved = Invoice {
        subtotal_cents: totals.subtotal_cents,
        tax_amount_cents: totals.tax_amount_cents,
        discount_amount_cents: totals.discount_amount_cents,
        total_amount_cents: totals.total_amount_cents,
        amount_paid_cents: paid,
        updated_at: Utc::now(),
        ..invoice
    };

    sqlx::query(
        "UPDATE invoices SET due_date = ?, lifecycle = ?, subtotal_cents = ?, tax_rate_bps = ?, tax_amount_cents = ?, \
         discount_amount_cents = ?, total_amount_cents = ?, amount_paid_cents = ?, notes = ?, payment_terms = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(saved.due_date)
    .bind(saved.lifecycle)
    .bind(saved.subtotal_cents)
    .bind(saved.tax_rate_bps)
    .bind(saved.tax_amount_cents)
    .bind(saved.discount_amount_cents)
    .bind(saved.total_amount_cents)
    .bind(saved.amount_paid_cents)
    .bind(&saved.notes)
    .bind(&saved.payment_terms)
    .bind(saved.updated_at)
    .bind(&saved.id)
    .execute(&mut *conn)
    .await?;

    Ok(saved)
}

async fn load_detail(conn: &mut SqliteConnection, invoice: Invoice, today: NaiveDate) -> DbResult<InvoiceDetail> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        "SELECT id, invoice_id, product_id, description, quantity, unit_price_cents, discount_rate_bps, total_price_cents \
         FROM invoice_items WHERE invoice_id = ? ORDER BY rowid",
    )
    .bind(&invoice.id)
    .fetch_all(&mut *conn)
    .await?;

    let payments = sqlx::query_as::<_, InvoicePayment>(
        "SELECT id, invoice_id, amount_cents, payment_method, transaction_id, notes, created_by, created_at \
         FROM invoice_payments WHERE invoice_id = ? ORDER BY created_at, rowid",
    )
    .bind(&invoice.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(InvoiceDetail {
        summary: invoice.summarize(today),
        items,
        payments,
    })
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Creates a draft invoice with its first lines.
    ///
    /// ## Errors
    /// - `NotFound` when the customer or a product is outside the shop
    /// - `Validation` for a due date before the issue date or a bad line
    /// - `UniqueViolation` when a product appears twice
    /// - `NegativeTotal` when the discount exceeds subtotal plus tax
    pub async fn create(&self, actor: &Actor, new: NewInvoice) -> DbResult<InvoiceDetail> {
        actor.require(Permission::ManageInvoices)?;
        let tenant_id = actor.write_tenant(new.tenant_id.as_deref())?;
        let issue_date = new.issue_date.unwrap_or_else(today);
        check_dates(issue_date, new.due_date)?;
        validate_rate_bps("tax_rate", new.tax_rate_bps)?;
        validate_amount_cents("discount", new.discount_cents)?;

        let tenant = TenantScope::Tenant(tenant_id.clone());
        let mut tx = begin_write(&self.pool).await?;

        let customer = find_customer(&mut tx, &tenant, &new.customer_id)
            .await?
            .or_not_found("Customer", &new.customer_id)?;

        let sequence = next_sequence(&mut tx, &tenant_id, &invoice_period(issue_date)).await?;
        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_number: invoice_number(&tenant_id, issue_date, sequence),
            tenant_id,
            customer_id: customer.id,
            issue_date,
            due_date: new.due_date,
            lifecycle: InvoiceLifecycle::Draft,
            subtotal_cents: 0,
            tax_rate_bps: new.tax_rate_bps,
            tax_amount_cents: 0,
            discount_amount_cents: 0,
            total_amount_cents: 0,
            amount_paid_cents: 0,
            notes: normalize_optional(new.notes),
            payment_terms: normalize_optional(new.payment_terms),
            share_token: share_token(),
            created_by: actor.user_id.clone(),
            created_at: now,
            updated_at: now,
        };

        // Inserted with zero totals; the discount is applied by save_totals
        sqlx::query(
            "INSERT INTO invoices (id, tenant_id, invoice_number, customer_id, issue_date, due_date, lifecycle, \
             tax_rate_bps, notes, payment_terms, share_token, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&invoice.id)
        .bind(&invoice.tenant_id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.customer_id)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.lifecycle)
        .bind(invoice.tax_rate_bps)
        .bind(&invoice.notes)
        .bind(&invoice.payment_terms)
        .bind(&invoice.share_token)
        .bind(&invoice.created_by)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(on_duplicate("invoice_number", &invoice.invoice_number))?;

        for item in new.items {
            insert_item(&mut tx, &invoice, item).await?;
        }

        let invoice = save_totals(
            &mut tx,
            Invoice {
                discount_amount_cents: new.discount_cents,
                ..invoice
            },
        )
        .await?;
        let detail = load_detail(&mut tx, invoice, today()).await?;
        tx.commit().await?;

        info!(
            invoice_id = %detail.summary.invoice.id,
            invoice_number = %detail.summary.invoice.invoice_number,
            total_cents = detail.summary.invoice.total_amount_cents,
            "Invoice created"
        );
        Ok(detail)
    }

    pub async fn add_item(&self, actor: &Actor, id: &str, item: NewInvoiceItem) -> DbResult<InvoiceDetail> {
        actor.require(Permission::ManageInvoices)?;
        let scope = actor.scope()?;

        let mut tx = begin_write(&self.pool).await?;
        let invoice = load_invoice(&mut tx, &scope, id).await?;
        invoice.ensure_editable("add items")?;

        let line = insert_item(&mut tx, &invoice, item).await?;
        let invoice = save_totals(&mut tx, invoice).await?;
        let detail = load_detail(&mut tx, invoice, today()).await?;
        tx.commit().await?;

        debug!(invoice_id = %id, item_id = %line.id, "Invoice item added");
        Ok(detail)
    }

    pub async fn remove_item(&self, actor: &Actor, id: &str, item_id: &str) -> DbResult<InvoiceDetail> {
        actor.require(Permission::ManageInvoices)?;
        let scope = actor.scope()?;

        let mut tx = begin_write(&self.pool).await?;
        let invoice = load_invoice(&mut tx, &scope, id).await?;
        invoice.ensure_editable("remove items")?;

        let removed = sqlx::query("DELETE FROM invoice_items WHERE id = ? AND invoice_id = ?")
            .bind(item_id)
            .bind(&invoice.id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice item", item_id));
        }

        let invoice = save_totals(&mut tx, invoice).await?;
        let detail = load_detail(&mut tx, invoice, today()).await?;
        tx.commit().await?;

        debug!(invoice_id = %id, item_id = %item_id, "Invoice item removed");
        Ok(detail)
    }

    /// Changes header fields of a draft.
    pub async fn update(&self, actor: &Actor, id: &str, update: InvoiceUpdate) -> DbResult<InvoiceDetail> {
        actor.require(Permission::ManageInvoices)?;
        let scope = actor.scope()?;
        if let Some(rate) = update.tax_rate_bps {
            validate_rate_bps("tax_rate", rate)?;
        }
        if let Some(discount) = update.discount_cents {
            validate_amount_cents("discount", discount)?;
        }

        let mut tx = begin_write(&self.pool).await?;
        let current = load_invoice(&mut tx, &scope, id).await?;
        current.ensure_editable("edit")?;

        let due_date = update.due_date.unwrap_or(current.due_date);
        check_dates(current.issue_date, due_date)?;

        let changed = Invoice {
            due_date,
            tax_rate_bps: update.tax_rate_bps.unwrap_or(current.tax_rate_bps),
            discount_amount_cents: update.discount_cents.unwrap_or(current.discount_amount_cents),
            notes: update.notes.map(Some).map(normalize_optional).unwrap_or(current.notes.clone()),
            payment_terms: update
                .payment_terms
                .map(Some)
                .map(normalize_optional)
                .unwrap_or(current.payment_terms.clone()),
            ..current
        };

        let invoice = save_totals(&mut tx, changed).await?;
        let detail = load_detail(&mut tx, invoice, today()).await?;
        tx.commit().await?;

        debug!(invoice_id = %id, "Invoice updated");
        Ok(detail)
    }

    /// Draft → Sent. Payments are accepted from here on.
    pub async fn send(&self, actor: &Actor, id: &str) -> DbResult<InvoiceDetail> {
        self.set_lifecycle(actor, id, InvoiceLifecycle::Sent).await
    }

    /// Cancels an invoice that has not received any payment.
    pub async fn cancel(&self, actor: &Actor, id: &str) -> DbResult<InvoiceDetail> {
        self.set_lifecycle(actor, id, InvoiceLifecycle::Cancelled).await
    }

    async fn set_lifecycle(&self, actor: &Actor, id: &str, to: InvoiceLifecycle) -> DbResult<InvoiceDetail> {
        actor.require(Permission::ManageInvoices)?;
        let scope = actor.scope()?;

        let mut tx = begin_write(&self.pool).await?;
        let invoice = load_invoice(&mut tx, &scope, id).await?;
        match to {
            InvoiceLifecycle::Sent => invoice.ensure_can_send()?,
            InvoiceLifecycle::Cancelled => {
                let payments = payment_count(&mut tx, &invoice.id).await?;
                invoice.ensure_can_cancel(payments)?;
            }
            InvoiceLifecycle::Draft => invoice.ensure_editable("reopen")?,
        }

        let invoice = save_totals(&mut tx, Invoice { lifecycle: to, ..invoice }).await?;
        let detail = load_detail(&mut tx, invoice, today()).await?;
        tx.commit().await?;

        info!(
            invoice_number = %detail.summary.invoice.invoice_number,
            lifecycle = to.as_str(),
            "Invoice lifecycle changed"
        );
        Ok(detail)
    }

    /// Appends a payment to the ledger and re-sums `amount_paid`.
    ///
    /// ## Errors
    /// - `InvalidState` unless the invoice has been sent
    /// - `InvalidPaymentAmount` below one cent
    /// - `PaymentExceedsBalance` above the balance due
    pub async fn add_payment(&self, actor: &Actor, id: &str, payment: NewInvoicePayment) -> DbResult<InvoiceDetail> {
        actor.require(Permission::ManageInvoices)?;
        let scope = actor.scope()?;
        let amount = Money::from_cents(payment.amount_cents);

        let mut tx = begin_write(&self.pool).await?;
        let invoice = load_invoice(&mut tx, &scope, id).await?;
        invoice.check_payment(amount)?;

        sqlx::query(
            "INSERT INTO invoice_payments (id, invoice_id, amount_cents, payment_method, transaction_id, notes, \
             created_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&invoice.id)
        .bind(amount.cents())
        .bind(payment.payment_method)
        .bind(normalize_optional(payment.transaction_id))
        .bind(normalize_optional(payment.notes))
        .bind(&actor.user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let invoice = save_totals(&mut tx, invoice).await?;
        let detail = load_detail(&mut tx, invoice, today()).await?;
        tx.commit().await?;

        info!(
            invoice_number = %detail.summary.invoice.invoice_number,
            amount_cents = amount.cents(),
            balance_due_cents = detail.summary.balance_due_cents,
            status = detail.summary.status.as_str(),
            "Invoice payment recorded"
        );
        Ok(detail)
    }

    /// Deletes an invoice with its items and payments.
    ///
    /// ## Errors
    /// - `PermissionDenied` for a paid invoice unless the actor is a site admin
    /// - `ConfirmationMismatch` when payments exist and `confirmation` is not
    ///   the invoice number
    pub async fn delete(&self, actor: &Actor, id: &str, confirmation: Option<&str>) -> DbResult<()> {
        actor.require(Permission::ManageInvoices)?;
        let scope = actor.scope()?;

        let mut tx = begin_write(&self.pool).await?;
        let invoice = load_invoice(&mut tx, &scope, id).await?;
        let payments = payment_count(&mut tx, &invoice.id).await?;
        invoice.ensure_can_delete(today(), actor.is_site_admin(), payments, confirmation)?;

        sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(&invoice.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(invoice_number = %invoice.invoice_number, payments, "Invoice deleted");
        Ok(())
    }

    pub async fn get(&self, scope: &TenantScope, id: &str, today: NaiveDate) -> DbResult<InvoiceDetail> {
        let mut conn = self.pool.acquire().await?;
        let invoice = load_invoice(&mut conn, scope, id).await?;
        load_detail(&mut conn, invoice, today).await
    }

    /// Lists invoices, newest first. The status filter matches the derived
    /// status, so it is applied after each row is summarized.
    pub async fn list(&self, scope: &TenantScope, today: NaiveDate, filter: InvoiceFilter) -> DbResult<Vec<InvoiceSummary>> {
        let mut qb = scoped_query(INVOICE_COLUMNS, scope, "tenant_id");
        if let Some(customer_id) = filter.customer_id {
            qb.push(" AND customer_id = ");
            qb.push_bind(customer_id);
        }
        qb.push(" ORDER BY issue_date DESC, created_at DESC");

        let invoices = qb.build_query_as::<Invoice>().fetch_all(&self.pool).await?;
        Ok(invoices
            .into_iter()
            .map(|i| i.summarize(today))
            .filter(|s| filter.status.map_or(true, |wanted| s.status == wanted))
            .collect())
    }

    /// Unauthenticated read through the share token.
    pub async fn public(&self, token: &str, today: NaiveDate) -> DbResult<InvoiceDetail> {
        let mut conn = self.pool.acquire().await?;
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{} WHERE share_token = ?", INVOICE_COLUMNS))
            .bind(token)
            .fetch_optional(&mut *conn)
            .await?
            .or_not_found("Invoice", token)?;
        load_detail(&mut conn, invoice, today).await
    }

    pub async fn dashboard(&self, scope: &TenantScope, today: NaiveDate) -> DbResult<InvoiceDashboard> {
        let invoices = scoped_query(INVOICE_COLUMNS, scope, "tenant_id")
            .build_query_as::<Invoice>()
            .fetch_all(&self.pool)
            .await?;
        Ok(InvoiceDashboard::from_invoices(&invoices, today))
    }

    /// Replays items and the payment ledger into the stored amounts.
    pub async fn recompute(&self, scope: &TenantScope, id: &str) -> DbResult<Invoice> {
        let mut tx = begin_write(&self.pool).await?;
        let invoice = load_invoice(&mut tx, scope, id).await?;
        let invoice = save_totals(&mut tx, invoice).await?;
        tx.commit().await?;

        debug!(invoice_id = %id, amount_paid_cents = invoice.amount_paid_cents, "Invoice recomputed");
        Ok(invoice)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::customer::NewCustomer;
    use crate::testing::{fixture, product, Fixture};
    use chrono::Duration;
    use shopdesk_core::CoreError;

    struct Setup {
        f: Fixture,
        customer_id: String,
        rice: String,
        oil: String,
    }

    async fn setup() -> Setup {
        let f = fixture().await;
        let rice = product(&f.db, &f.shop, "RICE-5KG", 10, 999).await.id;
        let oil = product(&f.db, &f.shop, "OIL-1L", 10, 500).await.id;
        let customer_id = f
            .db
            .customers()
            .create(
                &f.shop,
                NewCustomer {
                    name: "Acme Catering".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .id;
        Setup {
            f,
            customer_id,
            rice,
            oil,
        }
    }

    fn line(product_id: &str, quantity: i64, discount_rate_bps: u32) -> NewInvoiceItem {
        NewInvoiceItem {
            product_id: product_id.to_string(),
            description: None,
            quantity,
            unit_price_cents: None,
            discount_rate_bps,
        }
    }

    fn new_invoice(s: &Setup, items: Vec<NewInvoiceItem>) -> NewInvoice {
        let issue = today();
        NewInvoice {
            tenant_id: None,
            customer_id: s.customer_id.clone(),
            issue_date: Some(issue),
            due_date: issue + Duration::days(14),
            tax_rate_bps: 1_000,
            discount_cents: 0,
            notes: None,
            payment_terms: Some("Net 14".into()),
            items,
        }
    }

    fn pay(amount_cents: i64) -> NewInvoicePayment {
        NewInvoicePayment {
            amount_cents,
            payment_method: InvoicePaymentMethod::Bank,
            transaction_id: Some("TRX-1".into()),
            notes: None,
        }
    }

    fn assert_totals_hold(invoice: &Invoice) {
        assert_eq!(
            invoice.total_amount_cents,
            invoice.subtotal_cents + invoice.tax_amount_cents - invoice.discount_amount_cents
        );
    }

    #[tokio::test]
    async fn test_create_computes_totals_and_number() {
        let s = setup().await;
        let repo = s.f.db.invoices();

        // 2.5 × (9.99 - 15%) = 21.23; 1 × 5.00 = 5.00
        let mut new = new_invoice(&s, vec![line(&s.rice, 250, 1_500), line(&s.oil, 100, 0)]);
        new.discount_cents = 100;
        let detail = repo.create(&s.f.shop, new).await.unwrap();
        let inv = &detail.summary.invoice;

        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].description, "Product RICE-5KG");
        assert_eq!(inv.subtotal_cents, 2_623);
        assert_eq!(inv.tax_amount_cents, 262);
        assert_eq!(inv.total_amount_cents, 2_785);
        assert_totals_hold(inv);
        assert_eq!(detail.summary.status, InvoiceStatus::Draft);

        let period = invoice_period(inv.issue_date);
        assert!(inv.invoice_number.starts_with("INV-"));
        assert!(inv.invoice_number.ends_with(&format!("-{}-0001", period)));

        let second = repo.create(&s.f.shop, new_invoice(&s, vec![])).await.unwrap();
        assert!(second.summary.invoice.invoice_number.ends_with("-0002"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let s = setup().await;
        let repo = s.f.db.invoices();

        let mut early_due = new_invoice(&s, vec![]);
        early_due.due_date = today() - Duration::days(1);
        assert!(matches!(
            repo.create(&s.f.shop, early_due).await,
            Err(DbError::Core(CoreError::Validation(_)))
        ));

        // Another shop's product is invisible
        let foreign = product(&s.f.db, &s.f.other_shop, "RICE-5KG", 5, 999).await;
        assert!(matches!(
            repo.create(&s.f.shop, new_invoice(&s, vec![line(&foreign.id, 100, 0)])).await,
            Err(DbError::NotFound { .. })
        ));

        assert!(matches!(
            repo.create(&s.f.shop, new_invoice(&s, vec![line(&s.rice, 100, 0), line(&s.rice, 200, 0)]))
                .await,
            Err(DbError::UniqueViolation { .. })
        ));

        // Failed creates do not consume numbers
        let ok = repo.create(&s.f.shop, new_invoice(&s, vec![])).await.unwrap();
        assert!(ok.summary.invoice.invoice_number.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_items_only_change_on_drafts() {
        let s = setup().await;
        let repo = s.f.db.invoices();
        let detail = repo.create(&s.f.shop, new_invoice(&s, vec![line(&s.rice, 100, 0)])).await.unwrap();
        let id = detail.summary.invoice.id.clone();

        let detail = repo.add_item(&s.f.cashier, &id, line(&s.oil, 200, 0)).await.unwrap();
        assert_eq!(detail.summary.invoice.subtotal_cents, 999 + 1_000);
        assert_totals_hold(&detail.summary.invoice);

        let oil_item = detail.items.iter().find(|i| i.product_id == s.oil).unwrap().id.clone();
        let detail = repo.remove_item(&s.f.shop, &id, &oil_item).await.unwrap();
        assert_eq!(detail.summary.invoice.subtotal_cents, 999);

        repo.send(&s.f.shop, &id).await.unwrap();
        assert!(matches!(
            repo.add_item(&s.f.shop, &id, line(&s.oil, 100, 0)).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));
        assert!(matches!(
            repo.update(&s.f.shop, &id, InvoiceUpdate::default()).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));
        assert!(matches!(
            repo.send(&s.f.shop, &id).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));
    }

    #[tokio::test]
    async fn test_payments_follow_ledger() {
        let s = setup().await;
        let repo = s.f.db.invoices();
        let mut new = new_invoice(&s, vec![line(&s.oil, 200, 0)]);
        new.tax_rate_bps = 0;
        let id = repo.create(&s.f.shop, new).await.unwrap().summary.invoice.id;

        assert!(matches!(
            repo.add_payment(&s.f.shop, &id, pay(100)).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));

        repo.send(&s.f.shop, &id).await.unwrap();
        let detail = repo.add_payment(&s.f.shop, &id, pay(400)).await.unwrap();
        assert_eq!(detail.summary.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(detail.summary.balance_due_cents, 600);

        assert!(matches!(
            repo.add_payment(&s.f.shop, &id, pay(601)).await,
            Err(DbError::Core(CoreError::PaymentExceedsBalance { balance_cents: 600, .. }))
        ));

        let detail = repo.add_payment(&s.f.shop, &id, pay(600)).await.unwrap();
        assert_eq!(detail.summary.status, InvoiceStatus::Paid);
        assert_eq!(detail.payments.len(), 2);
        let ledger: i64 = detail.payments.iter().map(|p| p.amount_cents).sum();
        assert_eq!(ledger, detail.summary.invoice.amount_paid_cents);

        assert!(matches!(
            repo.cancel(&s.f.shop, &id).await,
            Err(DbError::Core(CoreError::InvalidState { .. }))
        ));
    }

    #[tokio::test]
    async fn test_recompute_replays_ledger() {
        let s = setup().await;
        let repo = s.f.db.invoices();
        let id = repo.create(&s.f.shop, new_invoice(&s, vec![line(&s.oil, 200, 0)])).await.unwrap().summary.invoice.id;
        repo.send(&s.f.shop, &id).await.unwrap();
        repo.add_payment(&s.f.shop, &id, pay(500)).await.unwrap();

        sqlx::query("UPDATE invoices SET amount_paid_cents = 0 WHERE id = ?")
            .bind(&id)
            .execute(s.f.db.pool())
            .await
            .unwrap();

        let scope = s.f.shop.scope().unwrap();
        let fixed = repo.recompute(&scope, &id).await.unwrap();
        assert_eq!(fixed.amount_paid_cents, 500);
        assert_totals_hold(&fixed);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let s = setup().await;
        let repo = s.f.db.invoices();
        let mut new = new_invoice(&s, vec![line(&s.oil, 100, 0)]);
        new.tax_rate_bps = 0;
        let detail = repo.create(&s.f.shop, new).await.unwrap();
        let id = detail.summary.invoice.id.clone();
        let number = detail.summary.invoice.invoice_number.clone();

        repo.send(&s.f.shop, &id).await.unwrap();
        repo.add_payment(&s.f.shop, &id, pay(500)).await.unwrap();

        // Paid: only a site admin, and only with the number as confirmation
        assert!(matches!(
            repo.delete(&s.f.shop, &id, Some(&number)).await,
            Err(DbError::Core(CoreError::PermissionDenied { .. }))
        ));
        assert!(matches!(
            repo.delete(&s.f.site, &id, None).await,
            Err(DbError::Core(CoreError::ConfirmationMismatch { .. }))
        ));
        repo.delete(&s.f.site, &id, Some(&number)).await.unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_payments")
            .fetch_one(s.f.db.pool())
            .await
            .unwrap();
        assert_eq!(remaining, 0);

        let draft = repo.create(&s.f.shop, new_invoice(&s, vec![])).await.unwrap();
        repo.delete(&s.f.shop, &draft.summary.invoice.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_scoping_public_read_and_dashboard() {
        let s = setup().await;
        let repo = s.f.db.invoices();
        let detail = repo.create(&s.f.shop, new_invoice(&s, vec![line(&s.oil, 100, 0)])).await.unwrap();
        let id = detail.summary.invoice.id.clone();

        let other = s.f.other_shop.scope().unwrap();
        assert!(matches!(repo.get(&other, &id, today()).await, Err(DbError::NotFound { .. })));
        assert!(repo.list(&other, today(), InvoiceFilter::default()).await.unwrap().is_empty());
        assert!(matches!(
            repo.send(&s.f.other_shop, &id).await,
            Err(DbError::NotFound { .. })
        ));

        let public = repo.public(&detail.summary.invoice.share_token, today()).await.unwrap();
        assert_eq!(public.summary.invoice.id, id);
        assert!(matches!(repo.public("nope", today()).await, Err(DbError::NotFound { .. })));

        repo.send(&s.f.shop, &id).await.unwrap();
        let scope = s.f.shop.scope().unwrap();
        let later = today() + Duration::days(30);
        let overdue = InvoiceFilter {
            status: Some(InvoiceStatus::Overdue),
            ..Default::default()
        };
        assert_eq!(repo.list(&scope, later, overdue.clone()).await.unwrap().len(), 1);
        assert!(repo.list(&scope, today(), overdue).await.unwrap().is_empty());

        let dash = repo.dashboard(&scope, later).await.unwrap();
        assert_eq!(dash.total.count, 1);
        assert_eq!(dash.overdue.count, 1);
        assert_eq!(dash.pending.amount_cents, detail.summary.invoice.total_amount_cents);
        assert_eq!(repo.dashboard(&other, later).await.unwrap().total.count, 0);
    }
}
