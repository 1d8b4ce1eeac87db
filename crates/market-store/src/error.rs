use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when interacting with the market store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write targeted a row this transaction has not locked.
    #[error("{entity} {id} is not locked by this transaction")]
    NotLocked { entity: &'static str, id: String },

    /// A write targeted a row that does not exist.
    #[error("{entity} {id} does not exist")]
    RowNotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// A stored row could not be turned back into a domain value.
    #[error("Corrupt {table} row: {source}")]
    Corrupt {
        table: &'static str,
        #[source]
        source: DomainError,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
