//! Error types for the store.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure at startup.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored status string the state machine does not recognize.
    #[error("corrupt status column: {0}")]
    CorruptStatus(String),

    /// Referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}
