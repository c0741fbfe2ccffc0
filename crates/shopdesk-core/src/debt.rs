//! # Debts
//!
//! Customer debts opened by credit sales and settled through an append-only
//! payment ledger.
//!
//! ## Ledger Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  debts                          debt_payments (append-only)            │
//! │  ┌──────────────────────────┐   ┌───────────────────────────────┐      │
//! │  │ amount       10_000      │   │ 2_000  cash    2026-10-01     │      │
//! │  │ amount_paid   5_000 ◄────┼───┤ 3_000  mobile  2026-10-08     │      │
//! │  │ due_date  2026-11-01     │   └───────────────────────────────┘      │
//! │  └──────────────────────────┘                                          │
//! │                                                                         │
//! │  amount_paid is always SUM(payments), rewritten on every insert.       │
//! │  balance and status are never stored.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::sale::PaymentMethod;

// =============================================================================
// Debt Status
// =============================================================================

/// Derived debt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DebtStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl DebtStatus {
    /// Derives the status from the stored facts.
    ///
    /// ```text
    /// balance <= 0          → Paid
    /// due_date < today      → Overdue
    /// amount_paid > 0       → Partial
    /// otherwise             → Pending
    /// ```
    pub fn derive(amount: Money, amount_paid: Money, due_date: NaiveDate, today: NaiveDate) -> Self {
        let balance = amount - amount_paid;
        if !balance.is_positive() {
            DebtStatus::Paid
        } else if due_date < today {
            DebtStatus::Overdue
        } else if amount_paid.is_positive() {
            DebtStatus::Partial
        } else {
            DebtStatus::Pending
        }
    }

    /// The only definition of "paid" for a debt.
    #[inline]
    pub fn is_settled(&self) -> bool {
        *self == DebtStatus::Paid
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Pending => "pending",
            DebtStatus::Partial => "partial",
            DebtStatus::Paid => "paid",
            DebtStatus::Overdue => "overdue",
        }
    }
}

// =============================================================================
// Debt
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Debt {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    /// Credit sale that opened the debt.
    pub sale_id: Option<String>,
    pub amount_cents: i64,
    /// Mirror of SUM(debt_payments.amount_cents).
    pub amount_paid_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    /// Outstanding amount; zero or negative once settled.
    #[inline]
    pub fn balance(&self) -> Money {
        self.amount() - self.amount_paid()
    }

    pub fn status(&self, today: NaiveDate) -> DebtStatus {
        DebtStatus::derive(self.amount(), self.amount_paid(), self.due_date, today)
    }

    /// Checks a payment against this debt before it reaches the ledger.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` for zero or negative amounts
    /// - `Validation` for the `Credit` method
    /// - `PaymentExceedsBalance` when the payment is larger than the balance
    pub fn check_payment(&self, amount: Money, method: PaymentMethod) -> CoreResult<()> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "payment must be greater than zero".to_string(),
            });
        }
        if method == PaymentMethod::Credit {
            return Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: ["cash", "card", "mobile", "bank"].iter().map(|s| s.to_string()).collect(),
            }
            .into());
        }
        let balance = self.balance();
        if amount > balance {
            return Err(CoreError::PaymentExceedsBalance {
                amount_cents: amount.cents(),
                balance_cents: balance.cents(),
            });
        }
        Ok(())
    }

    /// Pairs the debt with its derived fields.
    pub fn summarize(self, today: NaiveDate) -> DebtSummary {
        DebtSummary {
            balance_cents: self.balance().cents(),
            status: self.status(today),
            debt: self,
        }
    }
}

/// A debt with derived balance and status, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtSummary {
    #[serde(flatten)]
    pub debt: Debt,
    pub balance_cents: i64,
    pub status: DebtStatus,
}

/// One payment in the debt ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebtPayment {
    pub id: String,
    pub debt_id: String,
    pub tenant_id: String,
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A debt with its derived fields and payment history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtDetail {
    #[serde(flatten)]
    pub summary: DebtSummary,
    pub payments: Vec<DebtPayment>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn debt(amount: i64, paid: i64, due: &str) -> Debt {
        Debt {
            id: "d1".into(),
            tenant_id: "t1".into(),
            customer_id: "c1".into(),
            sale_id: None,
            amount_cents: amount,
            amount_paid_cents: paid,
            due_date: date(due),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_derivation() {
        let today = date("2026-10-15");
        assert_eq!(debt(1000, 0, "2026-11-01").status(today), DebtStatus::Pending);
        assert_eq!(debt(1000, 400, "2026-11-01").status(today), DebtStatus::Partial);
        assert_eq!(debt(1000, 1000, "2026-11-01").status(today), DebtStatus::Paid);
        assert_eq!(debt(1000, 400, "2026-10-14").status(today), DebtStatus::Overdue);
        assert_eq!(debt(1000, 0, "2026-10-15").status(today), DebtStatus::Pending);
    }

    #[test]
    fn test_paid_wins_over_overdue() {
        let today = date("2026-10-15");
        let status = debt(1000, 1000, "2026-01-01").status(today);
        assert!(status.is_settled());
    }

    #[test]
    fn test_check_payment() {
        let d = debt(1000, 400, "2026-11-01");
        assert!(d.check_payment(Money::from_cents(600), PaymentMethod::Cash).is_ok());
        assert!(matches!(
            d.check_payment(Money::from_cents(601), PaymentMethod::Cash),
            Err(CoreError::PaymentExceedsBalance { balance_cents: 600, .. })
        ));
        assert!(matches!(
            d.check_payment(Money::zero(), PaymentMethod::Cash),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));
        assert!(matches!(
            d.check_payment(Money::from_cents(100), PaymentMethod::Credit),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_summary_carries_derived_fields() {
        let summary = debt(1000, 250, "2026-11-01").summarize(date("2026-10-15"));
        assert_eq!(summary.balance_cents, 750);
        assert_eq!(summary.status, DebtStatus::Partial);
    }
}
