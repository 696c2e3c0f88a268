//! Storage error type.

use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Checking a connection out of the pool failed.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The unique-ID allocator ran out of attempts. Collisions and probe
    /// failures both land here; the loop is bounded either way.
    #[error("id allocation exhausted for {table} after {attempts} attempts")]
    IdExhausted {
        /// Target table.
        table: String,
        /// Attempts consumed.
        attempts: u32,
    },

    /// A table or column name failed identifier validation.
    #[error("invalid sql identifier: {0}")]
    InvalidIdentifier(String),

    /// A row expected to exist was not found.
    #[error("not found: {0}")]
    NotFound(String),
}
