//! # Error Types
//!
//! Domain-specific error types for shopdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shopdesk-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  shopdesk-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures (wraps CoreError too)        │
//! │                                                                         │
//! │  API errors (apps/api)                                                 │
//! │  └── ApiError         - What HTTP clients see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// Every variant carries enough context (ids, amounts) for the API layer to
/// build a user-facing message without another lookup.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough stock to fulfil a sale line, checkout or stock removal.
    ///
    /// ## When This Occurs
    /// ```text
    /// Sale line: 5 × SKU "COKE-330"
    ///      │
    ///      ▼
    /// UPDATE stock ... WHERE quantity >= 5   → 0 rows
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "COKE-330", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole transaction rolls back, no partial sale is left behind
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// The actor's role does not allow the action.
    #[error("Permission denied: {action}")]
    PermissionDenied { action: String },

    /// The actor has no tenant (e.g. a cashier not attached to any shop
    /// admin, or a site admin creating a record without naming a tenant).
    #[error("A tenant is required: {reason}")]
    TenantRequired { reason: String },

    /// The record is in a state that does not allow the operation.
    ///
    /// ## When This Occurs
    /// - Adding items to an invoice that is no longer a draft
    /// - Recording a payment against a cancelled invoice
    /// - Reopening a cancelled storefront order
    #[error("{entity} {id} is {state}: cannot {action}")]
    InvalidState {
        entity: String,
        id: String,
        state: String,
        action: String,
    },

    /// A payment would push the paid amount past the amount owed.
    #[error("Payment of {amount_cents} cents exceeds outstanding balance of {balance_cents} cents")]
    PaymentExceedsBalance {
        amount_cents: i64,
        balance_cents: i64,
    },

    /// Payment amount is invalid (zero, negative, below tendered total).
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// A credit sale would take the customer past their credit limit.
    #[error("Credit limit exceeded for customer {customer_id}: available {available_cents} cents, requested {requested_cents} cents")]
    CreditLimitExceeded {
        customer_id: String,
        available_cents: i64,
        requested_cents: i64,
    },

    /// A destructive operation was not confirmed with the document number.
    #[error("Confirmation does not match {expected}")]
    ConfirmationMismatch { expected: String },

    /// Discount larger than subtotal plus tax.
    #[error("Discount of {discount_cents} cents exceeds the amount before discount ({gross_cents} cents)")]
    NegativeTotal {
        gross_cents: i64,
        discount_cents: i64,
    },

    /// A computed amount left the range money can hold.
    ///
    /// ## When This Occurs
    /// Input bounds keep single values small, so this only fires when many
    /// large lines are combined into one total.
    #[error("Amount too large: {what}")]
    AmountOverflow { what: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a PermissionDenied error for the given action.
    pub fn denied(action: impl Into<String>) -> Self {
        CoreError::PermissionDenied {
            action: action.into(),
        }
    }

    pub fn overflow(what: impl Into<String>) -> Self {
        CoreError::AmountOverflow { what: what.into() }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        state: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.into(),
            id: id.into(),
            state: state.into(),
            action: action.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Used for early validation before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Creates a Required error for `field`.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "COKE-330".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COKE-330: available 3, requested 5"
        );

        let err = CoreError::invalid_state("Invoice", "inv-1", "sent", "add items");
        assert_eq!(err.to_string(), "Invoice inv-1 is sent: cannot add items");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("sku").to_string(), "sku is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 999,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 999");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
