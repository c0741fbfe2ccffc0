//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Business rule (CoreError)           │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────────────────┘                             │
//! │       │   rules are checked inside the same transaction as the         │
//! │       │   writes, so both kinds surface here                           │
//! │       ▼                                                                 │
//! │  ApiError (apps/api) ← status code + JSON body                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use shopdesk_core::{CoreError, ValidationError};
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - ID doesn't exist
    /// - ID exists but belongs to another tenant (never reported as forbidden)
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate SKU within a tenant
    /// - Duplicate username
    /// - Second storefront for the same tenant
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A referenced row is missing, e.g. a customer id that was never
    /// created. Scoped lookups normally catch this first.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected a statement for any other reason (CHECK, NOT NULL,
    /// syntax).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Column named by a SQLite constraint message.
///
/// `"UNIQUE constraint failed: products.tenant_id, products.sku"` → `"sku"`
fn constraint_column(message: &str) -> String {
    message
        .rsplit(": ")
        .next()
        .and_then(|cols| cols.rsplit(", ").next())
        .and_then(|col| col.rsplit('.').next())
        .unwrap_or("unknown")
        .to_string()
}

/// Converts sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// RowNotFound                  → NotFound
/// Database, UniqueViolation    → UniqueViolation (column from the message)
/// Database, ForeignKeyViolation→ ForeignKeyViolation
/// Database, other              → QueryFailed
/// PoolTimedOut                 → PoolExhausted
/// PoolClosed, Io               → ConnectionFailed
/// Other                        → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => DbError::UniqueViolation {
                    field: constraint_column(db_err.message()),
                    value: "unknown".to_string(),
                },
                ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                    message: db_err.message().to_string(),
                },
                _ => DbError::QueryFailed(db_err.message().to_string()),
            },
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Maps a UNIQUE violation to a `UniqueViolation` naming the business field
/// and the offending value; other errors convert as usual.
pub(crate) fn on_duplicate(field: &str, value: &str) -> impl FnOnce(sqlx::Error) -> DbError {
    let field = field.to_string();
    let value = value.to_string();
    move |err| match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::UniqueViolation { field, value },
        other => other,
    }
}

/// Turns `Option<T>` from a scoped lookup into `NotFound`.
pub(crate) trait OrNotFound<T> {
    fn or_not_found(self, entity: &str, id: &str) -> DbResult<T>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, entity: &str, id: &str) -> DbResult<T> {
        self.ok_or_else(|| DbError::not_found(entity, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let err: DbError = CoreError::denied("delete sales").into();
        assert_eq!(err.to_string(), "Permission denied: delete sales");

        let err: DbError = ValidationError::required("sku").into();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[test]
    fn test_constraint_column() {
        assert_eq!(constraint_column("UNIQUE constraint failed: users.username"), "username");
        assert_eq!(
            constraint_column("UNIQUE constraint failed: products.tenant_id, products.sku"),
            "sku"
        );
    }

    #[tokio::test]
    async fn test_sqlite_constraint_kinds() {
        let db = crate::Database::new(crate::DbConfig::in_memory()).await.unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, code TEXT UNIQUE, parent INTEGER REFERENCES t(id))")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (id, code) VALUES (1, 'a')").execute(db.pool()).await.unwrap();

        let dup: DbError = sqlx::query("INSERT INTO t (id, code) VALUES (2, 'a')")
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(dup, DbError::UniqueViolation { ref field, .. } if field == "code"));

        let orphan: DbError = sqlx::query("INSERT INTO t (id, code, parent) VALUES (3, 'b', 99)")
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(orphan, DbError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn test_or_not_found() {
        let missing: Option<i32> = None;
        let err = missing.or_not_found("Invoice", "inv-1").unwrap_err();
        assert_eq!(err.to_string(), "Invoice not found: inv-1");
    }
}
