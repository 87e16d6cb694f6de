//! Error types for the scheduler loop.

use thiserror::Error;

use cadence_queue::QueueError;
use cadence_store::StoreError;

/// Errors that can occur in claimer operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Queue failure.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}
