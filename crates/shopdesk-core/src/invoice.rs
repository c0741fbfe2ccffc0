//! # Invoices
//!
//! Invoice totals, line arithmetic and the derived invoice status.
//!
//! ## Stored vs Derived
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  STORED (set by people)            DERIVED (computed on every read)    │
//! │  ─────────────────────────         ──────────────────────────────────  │
//! │  lifecycle: Draft|Sent|Cancelled   status: Draft, Sent, PartiallyPaid,  │
//! │  items, tax_rate, discount                 Paid, Overdue, Cancelled     │
//! │  payments (ledger)                 subtotal = Σ items.total_price      │
//! │                                    tax      = round(subtotal × rate)   │
//! │                                    total    = subtotal + tax − discount│
//! │                                    amount_paid = Σ payments            │
//! │                                    balance_due = total − amount_paid   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The subtotal, tax, total and amount-paid columns exist for querying,
//! but every write rewrites them from items and payments.
//!
//! ## Status Rules (first match wins)
//! ```text
//! 1. lifecycle Cancelled                     → Cancelled
//! 2. lifecycle Draft                         → Draft
//! 3. total > 0 and paid >= total             → Paid
//!    total == 0                              → Paid
//! 4. due_date < today and balance_due > 0    → Overdue
//! 5. paid > 0                                → PartiallyPaid
//! 6. otherwise                               → Sent
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percent, FULL_PERCENT_BPS};
use crate::validation::{line_total_in_range, validate_amount_cents, MAX_INVOICE_QUANTITY_HUNDREDTHS};

// =============================================================================
// Lifecycle and Status
// =============================================================================

/// The manually controlled part of an invoice's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum InvoiceLifecycle {
    Draft,
    Sent,
    Cancelled,
}

impl InvoiceLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceLifecycle::Draft => "draft",
            InvoiceLifecycle::Sent => "sent",
            InvoiceLifecycle::Cancelled => "cancelled",
        }
    }
}

/// Derived invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 6] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    /// Derives the status from stored facts and today's date.
    pub fn derive(
        lifecycle: InvoiceLifecycle,
        total: Money,
        amount_paid: Money,
        due_date: NaiveDate,
        today: NaiveDate,
    ) -> Self {
        match lifecycle {
            InvoiceLifecycle::Cancelled => return InvoiceStatus::Cancelled,
            InvoiceLifecycle::Draft => return InvoiceStatus::Draft,
            InvoiceLifecycle::Sent => {}
        }

        let balance_due = total - amount_paid;
        if !total.is_positive() || amount_paid >= total {
            InvoiceStatus::Paid
        } else if due_date < today && balance_due.is_positive() {
            InvoiceStatus::Overdue
        } else if amount_paid.is_positive() {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Sent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Header amounts of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal_cents: i64,
    pub tax_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub total_amount_cents: i64,
}

impl InvoiceTotals {
    /// Computes tax and total from the subtotal.
    ///
    /// ```rust
    /// use shopdesk_core::invoice::InvoiceTotals;
    /// use shopdesk_core::money::{Money, Percent};
    ///
    /// let t = InvoiceTotals::compute(Money::from_cents(20_000), Percent::from_bps(1600), Money::from_cents(1_000)).unwrap();
    /// assert_eq!(t.tax_amount_cents, 3_200);
    /// assert_eq!(t.total_amount_cents, 22_200);
    /// ```
    ///
    /// ## Errors
    /// `NegativeTotal` when the discount is larger than subtotal plus tax.
    pub fn compute(subtotal: Money, tax_rate: Percent, discount: Money) -> CoreResult<Self> {
        let tax = subtotal.percent_of(tax_rate);
        let gross = subtotal
            .checked_add(tax)
            .ok_or_else(|| CoreError::overflow("invoice total"))?;
        if discount.is_negative() || discount > gross {
            return Err(CoreError::NegativeTotal {
                gross_cents: gross.cents(),
                discount_cents: discount.cents(),
            });
        }
        Ok(InvoiceTotals {
            subtotal_cents: subtotal.cents(),
            tax_amount_cents: tax.cents(),
            discount_amount_cents: discount.cents(),
            total_amount_cents: (gross - discount).cents(),
        })
    }
}

/// Line total: `quantity × (unit_price − round(unit_price × discount_rate))`.
///
/// Quantity is in hundredths of a unit. The per-unit discount is rounded
/// first, then the line is rounded to the cent.
///
/// ## Errors
/// `AmountOverflow` when the line is above `MAX_AMOUNT_CENTS`.
pub fn invoice_line_total(quantity_hundredths: i64, unit_price: Money, discount_rate: Percent) -> CoreResult<Money> {
    let total = unit_price
        .apply_percentage_discount(discount_rate)
        .multiply_hundredths(quantity_hundredths);
    line_total_in_range(total, "invoice line total")
}

/// Validates the inputs of one invoice line.
pub fn validate_invoice_line(
    quantity_hundredths: i64,
    unit_price: Money,
    discount_rate: Percent,
) -> Result<(), ValidationError> {
    if quantity_hundredths < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity_hundredths > MAX_INVOICE_QUANTITY_HUNDREDTHS {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_INVOICE_QUANTITY_HUNDREDTHS,
        });
    }
    validate_amount_cents("unit_price", unit_price.cents())?;
    if discount_rate.bps() > FULL_PERCENT_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount_rate".to_string(),
            min: 0,
            max: FULL_PERCENT_BPS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub tenant_id: String,
    /// `INV-{tenant8}-{YYYYMM}-{NNNN}`
    pub invoice_number: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub lifecycle: InvoiceLifecycle,
    pub subtotal_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub total_amount_cents: i64,
    pub amount_paid_cents: i64,
    pub notes: Option<String>,
    pub payment_terms: Option<String>,
    /// Public read token for sharing the invoice with the customer.
    pub share_token: String,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    #[inline]
    pub fn balance_due(&self) -> Money {
        self.total() - self.amount_paid()
    }

    #[inline]
    pub fn tax_rate(&self) -> Percent {
        Percent::from_bps(self.tax_rate_bps)
    }

    pub fn status(&self, today: NaiveDate) -> InvoiceStatus {
        InvoiceStatus::derive(self.lifecycle, self.total(), self.amount_paid(), self.due_date, today)
    }

    fn state_error(&self, action: &str) -> CoreError {
        CoreError::invalid_state("Invoice", &self.invoice_number, self.lifecycle.as_str(), action)
    }

    /// Items can only change while the invoice is a draft.
    pub fn ensure_editable(&self, action: &str) -> CoreResult<()> {
        if self.lifecycle == InvoiceLifecycle::Draft {
            Ok(())
        } else {
            Err(self.state_error(action))
        }
    }

    /// Draft → Sent.
    pub fn ensure_can_send(&self) -> CoreResult<()> {
        self.ensure_editable("send")
    }

    /// Cancelling is refused once money has been received.
    pub fn ensure_can_cancel(&self, payment_count: i64) -> CoreResult<()> {
        if self.lifecycle == InvoiceLifecycle::Cancelled {
            return Err(self.state_error("cancel"));
        }
        if payment_count > 0 {
            return Err(CoreError::invalid_state(
                "Invoice",
                &self.invoice_number,
                "partly or fully paid",
                "cancel",
            ));
        }
        Ok(())
    }

    /// Checks a payment before it is appended to the ledger.
    ///
    /// ## Errors
    /// - `InvalidState` unless the invoice has been sent
    /// - `InvalidPaymentAmount` for amounts under one cent
    /// - `PaymentExceedsBalance` when the amount is larger than the balance due
    pub fn check_payment(&self, amount: Money) -> CoreResult<()> {
        if self.lifecycle != InvoiceLifecycle::Sent {
            return Err(self.state_error("record payments"));
        }
        if amount.cents() < 1 {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "payment must be at least 0.01".to_string(),
            });
        }
        let balance = self.balance_due();
        if amount > balance {
            return Err(CoreError::PaymentExceedsBalance {
                amount_cents: amount.cents(),
                balance_cents: balance.cents(),
            });
        }
        Ok(())
    }

    /// Checks whether `deleted_by_site_admin` may delete this invoice.
    ///
    /// ```text
    /// status Paid            → site admin only
    /// has payments           → confirmation must equal invoice_number
    /// ```
    pub fn ensure_can_delete(
        &self,
        today: NaiveDate,
        deleted_by_site_admin: bool,
        payment_count: i64,
        confirmation: Option<&str>,
    ) -> CoreResult<()> {
        if self.status(today) == InvoiceStatus::Paid && !deleted_by_site_admin {
            return Err(CoreError::denied("delete a paid invoice"));
        }
        if payment_count > 0 && confirmation.map(str::trim) != Some(self.invoice_number.as_str()) {
            return Err(CoreError::ConfirmationMismatch {
                expected: self.invoice_number.clone(),
            });
        }
        Ok(())
    }

    /// Pairs the invoice with its derived fields.
    pub fn summarize(self, today: NaiveDate) -> InvoiceSummary {
        InvoiceSummary {
            status: self.status(today),
            balance_due_cents: self.balance_due().cents(),
            invoice: self,
        }
    }
}

/// An invoice with its derived status and balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub status: InvoiceStatus,
    pub balance_due_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// Defaults to the product name.
    pub description: String,
    /// Hundredths of a unit: 150 = 1.5.
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_rate_bps: u32,
    pub total_price_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum InvoicePaymentMethod {
    Cash,
    Card,
    Mobile,
    Bank,
    Check,
    Other,
}

/// One payment in the invoice ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoicePayment {
    pub id: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub payment_method: InvoicePaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Everything shown on an invoice page.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub summary: InvoiceSummary,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<InvoicePayment>,
}

// =============================================================================
// Dashboard
// =============================================================================

/// Count and amount for one slice of invoices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceBucket {
    pub count: i64,
    pub amount_cents: i64,
}

impl InvoiceBucket {
    fn add(&mut self, amount: Money) {
        self.count += 1;
        self.amount_cents += amount.cents();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusBreakdown {
    pub status: InvoiceStatus,
    pub count: i64,
    pub total_amount_cents: i64,
}

/// Invoice totals across a tenant scope.
///
/// - `total`: every invoice, by total amount
/// - `paid`: amount received across every invoice
/// - `pending`: unpaid balance of sent, not cancelled invoices
/// - `overdue`: balance of invoices whose derived status is Overdue
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDashboard {
    pub total: InvoiceBucket,
    pub paid: InvoiceBucket,
    pub pending: InvoiceBucket,
    pub overdue: InvoiceBucket,
    pub by_status: Vec<StatusBreakdown>,
}

impl InvoiceDashboard {
    pub fn from_invoices<'a, I>(invoices: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = &'a Invoice>,
    {
        let mut total = InvoiceBucket::default();
        let mut paid = InvoiceBucket::default();
        let mut pending = InvoiceBucket::default();
        let mut overdue = InvoiceBucket::default();
        let mut by_status: Vec<StatusBreakdown> = InvoiceStatus::ALL
            .iter()
            .map(|s| StatusBreakdown {
                status: *s,
                count: 0,
                total_amount_cents: 0,
            })
            .collect();

        for invoice in invoices {
            let status = invoice.status(today);
            total.add(invoice.total());
            if invoice.amount_paid().is_positive() {
                paid.add(invoice.amount_paid());
            }
            let balance = invoice.balance_due();
            if invoice.lifecycle == InvoiceLifecycle::Sent && balance.is_positive() {
                pending.add(balance);
            }
            if status == InvoiceStatus::Overdue {
                overdue.add(balance);
            }
            if let Some(slot) = by_status.iter_mut().find(|b| b.status == status) {
                slot.count += 1;
                slot.total_amount_cents += invoice.total_amount_cents;
            }
        }

        InvoiceDashboard {
            total,
            paid,
            pending,
            overdue,
            by_status,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
