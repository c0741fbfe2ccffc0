//! # Domain Types
//!
//! Catalogue, stock, supplier, customer and user records.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  StockMovement  │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  product_id     │   │  id (UUID)      │       │
//! │  │  tenant_id      │   │  movement_type  │   │  tenant_id      │       │
//! │  │  sku (per shop) │   │  quantity       │   │  credit_limit   │       │
//! │  │  + stock row    │   │  reference      │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     User        │   │    Supplier     │   │ CustomerCredit  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  role           │   │  tenant_id      │   │  total_debt     │       │
//! │  │  shop_admin_id  │   │  contact fields │   │  available      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4, immutable, used for database relations
//! - Business ID: (sku, sale_number, invoice_number, ...) human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, FULL_PERCENT_BPS};
use crate::tenant::Role;

// =============================================================================
// User
// =============================================================================

/// A user account. Credentials live outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    /// Shop admin this cashier works for (cashiers only).
    pub shop_admin_id: Option<String>,
    /// Trading name (shop admins only).
    pub shop_name: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A catalogue product joined with its stock row.
///
/// `products` and `stock` are separate tables (one stock row per product),
/// but they are always read together.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Shop admin that owns this product.
    pub tenant_id: String,

    /// Stock Keeping Unit, unique within the tenant.
    pub sku: String,

    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,

    /// Purchase cost in cents.
    pub cost_price_cents: i64,

    /// Shelf price in cents.
    pub selling_price_cents: i64,

    /// Soft-delete flag.
    pub is_active: bool,

    /// Units on hand (never negative).
    pub quantity: i64,

    /// At or below this level the product needs reordering.
    pub reorder_level: i64,

    pub max_stock: i64,
    pub location: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Returns true once stock has fallen to the reorder level.
    #[inline]
    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    /// Value of the stock on hand at cost.
    pub fn stock_value(&self) -> Money {
        self.cost_price().multiply_quantity(self.quantity)
    }

    /// Margin on the selling price in basis points.
    pub fn profit_margin_bps(&self) -> i64 {
        profit_margin_bps(self.cost_price(), self.selling_price())
    }
}

/// Profit margin in basis points: `(selling - cost) / selling`.
///
/// Zero when the selling price is zero. Negative when sold below cost.
///
/// ```rust
/// use shopdesk_core::money::Money;
/// use shopdesk_core::types::profit_margin_bps;
///
/// // cost $6, price $8 → 25%
/// assert_eq!(profit_margin_bps(Money::from_cents(600), Money::from_cents(800)), 2500);
/// assert_eq!(profit_margin_bps(Money::from_cents(600), Money::zero()), 0);
/// ```
pub fn profit_margin_bps(cost: Money, selling: Money) -> i64 {
    if selling.is_zero() {
        return 0;
    }
    let profit = (selling - cost).cents() as i128 * FULL_PERCENT_BPS as i128;
    let selling = selling.cents() as i128;
    let half = selling.abs() / 2;
    let rounded = if profit >= 0 {
        (profit + half) / selling
    } else {
        -((-profit + half) / selling)
    };
    rounded as i64
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Kind of stock movement recorded in the append-only movement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MovementType {
    /// Goods received.
    In,
    /// Goods sold or removed.
    Out,
    /// Absolute correction after a count.
    Adjust,
    /// Goods returned to stock (sale deleted, order cancelled).
    Return,
}

/// One entry in the stock movement log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Units moved; for `Adjust` this is the new absolute quantity.
    pub quantity: i64,
    /// Sale number or other document that caused the movement.
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A manual stock adjustment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StockAdjustment {
    /// Increase by the given quantity.
    Add,
    /// Decrease by the given quantity; fails if stock would go negative.
    Remove,
    /// Set the absolute quantity.
    Set,
}

impl StockAdjustment {
    /// Movement type logged for this adjustment.
    pub fn movement_type(&self) -> MovementType {
        match self {
            StockAdjustment::Add => MovementType::In,
            StockAdjustment::Remove => MovementType::Out,
            StockAdjustment::Set => MovementType::Adjust,
        }
    }
}

// =============================================================================
// Supplier
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// A customer of one shop. Credit sales create debts against the customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Maximum outstanding debt allowed; zero means no credit.
    pub credit_limit_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn credit_limit(&self) -> Money {
        Money::from_cents(self.credit_limit_cents)
    }
}

/// A customer's credit position.
///
/// `total_debt_cents` is the sum of outstanding balances of the customer's
/// unsettled debts, not of their original amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerCredit {
    pub credit_limit_cents: i64,
    pub total_debt_cents: i64,
    pub available_credit_cents: i64,
}

impl CustomerCredit {
    pub fn new(credit_limit: Money, total_debt: Money) -> Self {
        CustomerCredit {
            credit_limit_cents: credit_limit.cents(),
            total_debt_cents: total_debt.cents(),
            available_credit_cents: (credit_limit - total_debt).cents(),
        }
    }

    #[inline]
    pub fn available(&self) -> Money {
        Money::from_cents(self.available_credit_cents)
    }

    /// Checks that `amount` more debt fits under the credit limit.
    ///
    /// ## Errors
    /// `CreditLimitExceeded` when the available credit is smaller than `amount`.
    pub fn ensure_covers(&self, customer_id: &str, amount: Money) -> CoreResult<()> {
        if self.available() >= amount {
            Ok(())
        } else {
            Err(CoreError::CreditLimitExceeded {
                customer_id: customer_id.to_string(),
                available_cents: self.available_credit_cents,
                requested_cents: amount.cents(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
