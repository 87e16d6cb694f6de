//! Error types for the dispatch queue.

use thiserror::Error;

/// Errors that can occur in queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Underlying redis error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Job frame could not be encoded or decoded.
    #[error("job frame error: {0}")]
    Frame(#[from] serde_json::Error),

    /// The in-memory channel has been closed.
    #[error("queue closed")]
    Closed,
}
