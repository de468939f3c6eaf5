//! Error types for the fleet store.

use thiserror::Error;

/// Store operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Fleet store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLx error (connection, query, transaction)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Entity absent or inactive
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored JSON or id column failed to parse
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn corrupt_row(msg: impl Into<String>) -> Self {
        Self::CorruptRow(msg.into())
    }
}
