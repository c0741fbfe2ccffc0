//! # Storefront
//!
//! The public web shop of a tenant: profile, web catalogue, anonymous carts
//! and orders.
//!
//! ## Order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  visitor ─► cart (anonymous cart_id) ─► checkout ─► Order (Pending)    │
//! │                                            │                            │
//! │                          stock decremented │ conditionally              │
//! │                                            ▼                            │
//! │  Pending → Confirmed → Processing → Shipped → InTransit → Delivered    │
//! │                                                             → Signed    │
//! │         any ──────────────────────────────► Cancelled (terminal)       │
//! │                                                 │                       │
//! │                                                 └─ stock restored once  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, FULL_PERCENT_BPS};
use crate::validation::line_total_in_range;

// =============================================================================
// Shop Profile
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ShopTheme {
    Default,
    Modern,
    Classic,
}

impl Default for ShopTheme {
    fn default() -> Self {
        ShopTheme::Default
    }
}

/// A tenant's public shop page. One per tenant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShopProfile {
    pub id: String,
    pub tenant_id: String,
    /// URL segment; the shop admin's username.
    pub slug: String,
    pub business_name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub theme: ShopTheme,
    pub is_website_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Shop Product
// =============================================================================

/// A product listed on the web shop.
///
/// Web products keep their own price and stock, separate from the till
/// catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShopProduct {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: i64,
    /// Crossed-out price shown next to a discounted price.
    pub original_price_cents: Option<i64>,
    pub is_featured: bool,
    pub is_available: bool,
    pub stock_quantity: i64,
    /// False once retired.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ShopProduct {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Shown on the public listing.
    pub fn is_listed(&self) -> bool {
        self.is_active && self.is_available && self.is_in_stock()
    }

    /// Discount against the original price, in basis points; 0 without one.
    pub fn discount_bps(&self) -> u32 {
        discount_bps(self.price(), self.original_price_cents.map(Money::from_cents))
    }
}

/// `(original - price) / original` in basis points, rounded half-up.
pub fn discount_bps(price: Money, original: Option<Money>) -> u32 {
    match original {
        Some(original) if original > price && original.is_positive() => {
            let off = (original - price).cents() as i128 * FULL_PERCENT_BPS as i128;
            let orig = original.cents() as i128;
            ((off + orig / 2) / orig) as u32
        }
        _ => 0,
    }
}

/// A shop product with its derived discount, as shown to visitors.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ListedProduct {
    #[serde(flatten)]
    pub product: ShopProduct,
    pub discount_bps: u32,
}

impl From<ShopProduct> for ListedProduct {
    fn from(product: ShopProduct) -> Self {
        ListedProduct {
            discount_bps: product.discount_bps(),
            product,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One line of a cart, joined with the product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Current stock of the product.
    pub stock_quantity: i64,
}

impl CartLine {
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartView {
    pub cart_id: String,
    pub items: Vec<CartLine>,
    pub total_items: i64,
    pub total_price_cents: i64,
}

impl CartView {
    pub fn new(cart_id: impl Into<String>, items: Vec<CartLine>) -> Self {
        let total_items = items.iter().map(|l| l.quantity).sum();
        let total_price: Money = items.iter().map(CartLine::subtotal).sum();
        CartView {
            cart_id: cart_id.into(),
            items,
            total_items,
            total_price_cents: total_price.cents(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Exact subtotal for checkout.
    ///
    /// ## Errors
    /// `AmountOverflow` when a line or the sum is out of range.
    pub fn checkout_subtotal(&self) -> CoreResult<Money> {
        let mut lines = Vec::with_capacity(self.items.len());
        for line in &self.items {
            let total = Money::from_cents(line.unit_price_cents).checked_multiply_quantity(line.quantity);
            lines.push(line_total_in_range(total, "order line total")?);
        }
        Money::checked_sum(lines).ok_or_else(|| CoreError::overflow("order subtotal"))
    }
}

/// Checks that `wanted` units of a product fit in its stock.
pub fn ensure_cart_quantity(product: &ShopProduct, wanted: i64) -> CoreResult<()> {
    if wanted < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    if !product.is_active || !product.is_available {
        return Err(CoreError::invalid_state(
            "Product",
            &product.name,
            "unavailable",
            "add to cart",
        ));
    }
    if wanted > product.stock_quantity {
        return Err(CoreError::InsufficientStock {
            sku: product.name.clone(),
            available: product.stock_quantity,
            requested: wanted,
        });
    }
    Ok(())
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    InTransit,
    Delivered,
    Signed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Signed => "signed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Validates a status change and reports whether stock must go back.
    ///
    /// Returns `Ok(true)` exactly when the order moves into `Cancelled`.
    /// Leaving `Cancelled` is refused, so stock is restored at most once.
    pub fn transition(order_number: &str, from: OrderStatus, to: OrderStatus) -> CoreResult<bool> {
        if from == OrderStatus::Cancelled {
            return Err(CoreError::invalid_state(
                "Order",
                order_number,
                from.as_str(),
                format!("move to {}", to.as_str()),
            ));
        }
        Ok(to == OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    /// `ORD-XXXXXXXX`
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    /// Empty for pickup.
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal_cents: i64,
    pub delivery_fee_cents: i64,
    pub total_amount_cents: i64,
    #[ts(as = "Option<String>")]
    pub signed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub quantity: i64,
    /// Unit price at checkout.
    pub price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Contact details captured at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutDetails {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

impl CheckoutDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.customer_name.trim().is_empty() {
            return Err(ValidationError::required("customer_name"));
        }
        crate::validation::validate_email("customer_email", &self.customer_email)?;
        if self.customer_phone.trim().is_empty() {
            return Err(ValidationError::required("customer_phone"));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> ShopProduct {
        ShopProduct {
            id: "sp1".into(),
            tenant_id: "t1".into(),
            name: "Mug".into(),
            description: None,
            category: None,
            price_cents: 800,
            original_price_cents: Some(1000),
            is_featured: false,
            is_available: true,
            stock_quantity: stock,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_bps() {
        assert_eq!(product(1).discount_bps(), 2000);
        assert_eq!(discount_bps(Money::from_cents(1000), Some(Money::from_cents(900))), 0);
        assert_eq!(discount_bps(Money::from_cents(1000), None), 0);
        assert_eq!(discount_bps(Money::from_cents(200), Some(Money::from_cents(300))), 3333);
    }

    #[test]
    fn test_listing_rules() {
        assert!(product(1).is_listed());
        assert!(!product(0).is_listed());
        let mut hidden = product(5);
        hidden.is_available = false;
        assert!(!hidden.is_listed());
    }

    #[test]
    fn test_cart_quantity_checks() {
        let p = product(3);
        assert!(ensure_cart_quantity(&p, 3).is_ok());
        assert!(matches!(
            ensure_cart_quantity(&p, 4),
            Err(CoreError::InsufficientStock { available: 3, requested: 4, .. })
        ));
        assert!(ensure_cart_quantity(&p, 0).is_err());
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::new(
            "cart-1",
            vec![
                CartLine {
                    product_id: "a".into(),
                    name: "A".into(),
                    unit_price_cents: 250,
                    quantity: 2,
                    stock_quantity: 10,
                },
                CartLine {
                    product_id: "b".into(),
                    name: "B".into(),
                    unit_price_cents: 100,
                    quantity: 3,
                    stock_quantity: 10,
                },
            ],
        );
        assert_eq!(view.total_items, 5);
        assert_eq!(view.total_price_cents, 800);
        assert_eq!(view.checkout_subtotal().unwrap().cents(), 800);
        assert!(!view.is_empty());

        let huge = CartView::new(
            "cart-2",
            vec![CartLine {
                product_id: "gold".into(),
                name: "Gold".into(),
                unit_price_cents: i64::MAX / 2,
                quantity: 3,
                stock_quantity: 10,
            }],
        );
        assert!(matches!(huge.checkout_subtotal(), Err(CoreError::AmountOverflow { .. })));
    }

    #[test]
    fn test_order_transitions() {
        assert!(!OrderStatus::transition("ORD-1", OrderStatus::Pending, OrderStatus::Shipped).unwrap());
        assert!(OrderStatus::transition("ORD-1", OrderStatus::Shipped, OrderStatus::Cancelled).unwrap());
        assert!(matches!(
            OrderStatus::transition("ORD-1", OrderStatus::Cancelled, OrderStatus::Pending),
            Err(CoreError::InvalidState { .. })
        ));
        assert!(OrderStatus::transition("ORD-1", OrderStatus::Cancelled, OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_checkout_details_validation() {
        let mut details = CheckoutDetails {
            customer_name: "Ann".into(),
            customer_email: "ann@example.com".into(),
            customer_phone: "0700".into(),
            delivery_address: None,
            notes: None,
        };
        assert!(details.validate().is_ok());
        details.customer_email = "nope".into();
        assert!(details.validate().is_err());
        details.customer_email = "ann@example.com".into();
        details.customer_phone = " ".into();
        assert!(details.validate().is_err());
    }
}
