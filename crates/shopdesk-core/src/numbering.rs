//! # Document Numbers
//!
//! Human-readable numbers for sales, invoices and web orders.
//!
//! ```text
//! SALE-20261015-3F9A12C0        sale, random suffix
//! INV-5f2b9c1d-202610-0007      invoice, per-tenant monthly counter
//! ORD-7C21D0AA                  storefront order, random suffix
//! ```
//!
//! Invoice counters live in the database (`invoice_sequences`); this module
//! only formats the number once the next value is known.

use chrono::NaiveDate;
use uuid::Uuid;

/// First eight hex digits of a UUID, uppercased.
fn short_hex(id: Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

/// Formats a sale number from the sale date and a random id.
pub fn sale_number(date: NaiveDate, id: Uuid) -> String {
    format!("SALE-{}-{}", date.format("%Y%m%d"), short_hex(id))
}

/// Formats a storefront order number.
pub fn order_number(id: Uuid) -> String {
    format!("ORD-{}", short_hex(id))
}

/// Period key of the invoice counter: `YYYYMM`.
pub fn invoice_period(date: NaiveDate) -> String {
    date.format("%Y%m").to_string()
}

/// Formats an invoice number.
///
/// `tenant_short` is the first 8 hex characters of the tenant id with
/// hyphens removed.
///
/// ```rust
/// use chrono::NaiveDate;
/// use shopdesk_core::numbering::invoice_number;
///
/// let d = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
/// assert_eq!(
///     invoice_number("5f2b9c1d-0000-4000-8000-000000000000", d, 7),
///     "INV-5f2b9c1d-202610-0007"
/// );
/// ```
pub fn invoice_number(tenant_id: &str, date: NaiveDate, sequence: i64) -> String {
    let tenant_short: String = tenant_id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect::<String>()
        .to_lowercase();
    format!("INV-{}-{}-{:04}", tenant_short, invoice_period(date), sequence)
}

/// New random public share token for an invoice.
pub fn share_token() -> String {
    Uuid::new_v4().to_string()
}
