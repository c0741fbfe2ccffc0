//! # Sales
//!
//! Sale records, line merging and the arithmetic of a checkout at the till.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request lines ──► merge_lines ──► validate_sale_lines                  │
//! │                                         │                               │
//! │                                         ▼                               │
//! │  per line: price snapshot, sale_line_total = qty × unit_price           │
//! │                                         │                               │
//! │                                         ▼                               │
//! │  SaleTotals::compute(subtotal, tax_rate, discount)                      │
//! │                                         │                               │
//! │                                         ▼                               │
//! │  settle(method, total, tendered)                                        │
//! │     Cash   → amount_paid = total, change = tendered − total             │
//! │     Credit → amount_paid = 0, a Debt is opened for the total            │
//! │     other  → amount_paid = total                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percent};
use crate::validation::line_total_in_range;

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    Bank,
    /// Sold on account; the customer owes the total as a debt.
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Mobile => "mobile",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Credit => "credit",
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaleStatus {
    Pending,
    /// Every processed sale ends here.
    Completed,
    Cancelled,
    Refunded,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    /// `SALE-YYYYMMDD-XXXXXXXX`
    pub sale_number: String,
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub tax_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub total_amount_cents: i64,
    pub amount_paid_cents: i64,
    /// Cash handed over by the customer, when recorded.
    pub amount_tendered_cents: Option<i64>,
    pub change_amount_cents: i64,
    pub notes: Option<String>,
    /// User id of the cashier or admin who rang up the sale.
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Checks the confirmation typed before a destructive operation.
    pub fn confirm(&self, confirmation: &str) -> CoreResult<()> {
        if confirmation.trim() == self.sale_number {
            Ok(())
        } else {
            Err(CoreError::ConfirmationMismatch {
                expected: self.sale_number.clone(),
            })
        }
    }
}

/// A line on a sale. Uses the snapshot pattern to freeze product data.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Cost at time of sale, for profit reporting.
    pub unit_cost_cents: i64,
    pub total_price_cents: i64,
}

impl SaleItem {
    /// Gross profit on this line.
    pub fn profit(&self) -> Money {
        (Money::from_cents(self.unit_price_cents) - Money::from_cents(self.unit_cost_cents)).multiply_quantity(self.quantity)
    }
}

/// A sale with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Requests
// =============================================================================

/// One requested line: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Merges duplicate product lines, keeping first-seen order.
///
/// ```rust
/// use shopdesk_core::sale::{merge_lines, SaleLine};
///
/// let merged = merge_lines(vec![
///     SaleLine { product_id: "a".into(), quantity: 2 },
///     SaleLine { product_id: "b".into(), quantity: 1 },
///     SaleLine { product_id: "a".into(), quantity: 3 },
/// ]);
/// assert_eq!(merged.len(), 2);
/// assert_eq!(merged[0].quantity, 5);
/// ```
pub fn merge_lines(lines: Vec<SaleLine>) -> Vec<SaleLine> {
    let mut merged: Vec<SaleLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line),
        }
    }
    merged
}

/// Validates merged sale lines against the configured limits.
pub fn validate_sale_lines(
    lines: &[SaleLine],
    max_lines: usize,
    max_quantity: i64,
) -> Result<(), ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::required("items"));
    }
    if lines.len() > max_lines {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: max_lines as i64,
        });
    }
    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        if line.quantity < 1 || line.quantity > max_quantity {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: max_quantity,
            });
        }
    }
    Ok(())
}

/// Line total for a sale: whole units times unit price.
///
/// ## Errors
/// `AmountOverflow` when the line is above `MAX_AMOUNT_CENTS`.
pub fn sale_line_total(quantity: i64, unit_price: Money) -> CoreResult<Money> {
    line_total_in_range(unit_price.checked_multiply_quantity(quantity), "sale line total")
}

// =============================================================================
// Totals
// =============================================================================

/// Header totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal_cents: i64,
    pub tax_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub total_amount_cents: i64,
}

impl SaleTotals {
    /// `total = subtotal + round(subtotal × tax_rate) - discount`
    ///
    /// ## Errors
    /// - `Validation` for a negative discount
    /// - `NegativeTotal` when the discount exceeds subtotal plus tax
    pub fn compute(subtotal: Money, tax_rate: Percent, discount: Money) -> CoreResult<Self> {
        if discount.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "discount".to_string(),
            }
            .into());
        }
        let tax = subtotal.percent_of(tax_rate);
        let gross = subtotal
            .checked_add(tax)
            .ok_or_else(|| CoreError::overflow("sale total"))?;
        if discount > gross {
            return Err(CoreError::NegativeTotal {
                gross_cents: gross.cents(),
                discount_cents: discount.cents(),
            });
        }
        Ok(SaleTotals {
            subtotal_cents: subtotal.cents(),
            tax_amount_cents: tax.cents(),
            discount_amount_cents: discount.cents(),
            total_amount_cents: (gross - discount).cents(),
        })
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// How a sale's total was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub amount_paid: Money,
    pub amount_tendered: Option<Money>,
    pub change: Money,
}

/// Works out paid amount and change for a sale.
///
/// ## Rules
/// - `Credit`: nothing is paid now
/// - `Cash` with tendered amount: tendered must cover the total
/// - anything else: paid in full, no change
pub fn settle(method: PaymentMethod, total: Money, tendered: Option<Money>) -> CoreResult<Settlement> {
    match (method, tendered) {
        (PaymentMethod::Credit, _) => Ok(Settlement {
            amount_paid: Money::zero(),
            amount_tendered: None,
            change: Money::zero(),
        }),
        (PaymentMethod::Cash, Some(tendered)) => {
            if tendered < total {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("tendered {} is less than total {}", tendered, total),
                });
            }
            Ok(Settlement {
                amount_paid: total,
                amount_tendered: Some(tendered),
                change: tendered - total,
            })
        }
        _ => Ok(Settlement {
            amount_paid: total,
            amount_tendered: None,
            change: Money::zero(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, qty: i64) -> SaleLine {
        SaleLine {
            product_id: id.to_string(),
            quantity: qty,
        }
    }

    #[test]
    fn test_merge_lines_sums_duplicates() {
        let merged = merge_lines(vec![line("a", 1), line("b", 2), line("a", 4), line("b", 1)]);
        assert_eq!(merged, vec![line("a", 5), line("b", 3)]);
    }

    #[test]
    fn test_validate_sale_lines() {
        assert!(validate_sale_lines(&[line("a", 1)], 100, 999).is_ok());
        assert!(validate_sale_lines(&[], 100, 999).is_err());
        assert!(validate_sale_lines(&[line("a", 0)], 100, 999).is_err());
        assert!(validate_sale_lines(&[line("a", 1000)], 100, 999).is_err());
        assert!(validate_sale_lines(&[line("a", 1), line("b", 1)], 1, 999).is_err());
        assert!(validate_sale_lines(&[line(" ", 1)], 100, 999).is_err());
    }

    #[test]
    fn test_totals_without_tax_or_discount_equal_subtotal() {
        let totals = SaleTotals::compute(Money::from_cents(4_250), Percent::zero(), Money::zero()).unwrap();
        assert_eq!(totals.total_amount_cents, 4_250);
        assert_eq!(totals.tax_amount_cents, 0);
    }

    #[test]
    fn test_totals_with_tax_and_discount() {
        // $100 + 16% - $6 = $110
        let totals = SaleTotals::compute(
            Money::from_cents(10_000),
            Percent::from_bps(1600),
            Money::from_cents(600),
        )
        .unwrap();
        assert_eq!(totals.tax_amount_cents, 1_600);
        assert_eq!(totals.total_amount_cents, 11_000);
    }

    #[test]
    fn test_totals_reject_oversized_discount() {
        let err = SaleTotals::compute(Money::from_cents(100), Percent::zero(), Money::from_cents(101)).unwrap_err();
        assert!(matches!(err, CoreError::NegativeTotal { .. }));
    }

    #[test]
    fn test_line_total_bounds() {
        assert_eq!(sale_line_total(3, Money::from_cents(150)).unwrap().cents(), 450);

        let err = sale_line_total(3, Money::from_cents(i64::MAX / 2)).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));

        let err = SaleTotals::compute(Money::from_cents(i64::MAX - 10), Percent::from_bps(100), Money::zero()).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
    }

    #[test]
    fn test_settle_cash_change() {
        let s = settle(PaymentMethod::Cash, Money::from_cents(750), Some(Money::from_cents(1000))).unwrap();
        assert_eq!(s.amount_paid.cents(), 750);
        assert_eq!(s.change.cents(), 250);

        let err = settle(PaymentMethod::Cash, Money::from_cents(750), Some(Money::from_cents(500))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPaymentAmount { .. }));
    }

    #[test]
    fn test_settle_credit_and_card() {
        let s = settle(PaymentMethod::Credit, Money::from_cents(750), None).unwrap();
        assert!(s.amount_paid.is_zero());

        let s = settle(PaymentMethod::Card, Money::from_cents(750), Some(Money::from_cents(9999))).unwrap();
        assert_eq!(s.amount_paid.cents(), 750);
        assert!(s.change.is_zero());
        assert!(s.amount_tendered.is_none());
    }

    #[test]
    fn test_item_profit() {
        let item = SaleItem {
            id: "i".into(),
            sale_id: "s".into(),
            product_id: "p".into(),
            sku_snapshot: "SKU".into(),
            name_snapshot: "Thing".into(),
            quantity: 3,
            unit_price_cents: 500,
            unit_cost_cents: 350,
            total_price_cents: 1500,
        };
        assert_eq!(item.profit().cents(), 450);
    }
}
