//! # Reports
//!
//! Revenue is never stored. Each `DailyRevenue` row is an aggregate over the
//! sales table grouped by tenant and calendar day, so deleting a sale
//! corrects every report that covered it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::invoice::InvoiceDashboard;
use crate::money::Money;

/// Sales of one tenant on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DailyRevenue {
    pub tenant_id: String,
    /// `YYYY-MM-DD`
    pub day: String,
    pub transaction_count: i64,
    pub total_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub mobile_cents: i64,
    pub bank_cents: i64,
    pub credit_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    /// Σ quantity × (unit_price − unit_cost) over the day's items.
    pub profit_cents: i64,
}

impl DailyRevenue {
    /// Mean sale total, rounded half-up; zero without sales.
    pub fn average_ticket(&self) -> Money {
        average(self.total_cents, self.transaction_count)
    }
}

fn average(total_cents: i64, count: i64) -> Money {
    if count <= 0 {
        return Money::zero();
    }
    Money::from_cents((total_cents + count / 2) / count)
}

/// Grand totals over a run of days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RevenueTotals {
    pub transaction_count: i64,
    pub total_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub mobile_cents: i64,
    pub bank_cents: i64,
    pub credit_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub profit_cents: i64,
    pub average_ticket_cents: i64,
}

impl RevenueTotals {
    pub fn from_days(days: &[DailyRevenue]) -> Self {
        let mut t = RevenueTotals::default();
        for d in days {
            t.transaction_count += d.transaction_count;
            t.total_cents += d.total_cents;
            t.cash_cents += d.cash_cents;
            t.card_cents += d.card_cents;
            t.mobile_cents += d.mobile_cents;
            t.bank_cents += d.bank_cents;
            t.credit_cents += d.credit_cents;
            t.tax_cents += d.tax_cents;
            t.discount_cents += d.discount_cents;
            t.profit_cents += d.profit_cents;
        }
        t.average_ticket_cents = average(t.total_cents, t.transaction_count).cents();
        t
    }
}

/// Revenue by day plus grand totals for a date range.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub from: String,
    pub to: String,
    pub days: Vec<DailyRevenue>,
    pub totals: RevenueTotals,
}

impl SalesSummary {
    pub fn new(from: impl Into<String>, to: impl Into<String>, days: Vec<DailyRevenue>) -> Self {
        let totals = RevenueTotals::from_days(&days);
        SalesSummary {
            from: from.into(),
            to: to.into(),
            days,
            totals,
        }
    }
}

/// Landing page numbers for a shop (or all shops, for site admins).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShopDashboard {
    pub today: RevenueTotals,
    pub products_to_reorder: i64,
    pub outstanding_debt_cents: i64,
    pub invoices: InvoiceDashboard,
}
