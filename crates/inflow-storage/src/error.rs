// Error types for storage engines

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by event storage engines
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another non-deleted event already holds this idempotency key.
    /// `existing_id` is the surviving event, when it could be read back.
    #[error("idempotency key already in use")]
    IdempotencyConflict { existing_id: Option<Uuid> },

    /// Caller passed input the engine cannot store
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The engine does not implement this operation
    #[error("operation not supported by this storage engine: {0}")]
    Unsupported(&'static str),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Create an invalid-input error
    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidInput(msg.into())
    }
}
