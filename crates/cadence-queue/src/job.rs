//! Job frames and queue port traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::QueueError;

/// A dispatched publish job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    /// Caller-supplied idempotency key (`publish-{post_id}`).
    pub job_id: String,
    /// Post the worker should publish.
    pub post_id: i64,
}

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    /// Job accepted onto the queue.
    Queued,
    /// A job with the same id is already pending; nothing was enqueued.
    Duplicate,
}

/// Producer side of the dispatch substrate.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job, deduplicating on `job_id`.
    async fn enqueue(&self, job: &DispatchJob) -> Result<Enqueue, QueueError>;
}

/// Consumer side of the dispatch substrate.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Pop the next job, waiting up to the implementation's poll timeout.
    /// `Ok(None)` means the wait elapsed with nothing available, so callers
    /// can re-check shutdown and poll again.
    async fn next_job(&self) -> Result<Option<DispatchJob>, QueueError>;
}

#[async_trait]
impl<T: JobQueue + ?Sized> JobQueue for std::sync::Arc<T> {
    async fn enqueue(&self, job: &DispatchJob) -> Result<Enqueue, QueueError> {
        self.as_ref().enqueue(job).await
    }
}

#[async_trait]
impl<T: JobSource + ?Sized> JobSource for std::sync::Arc<T> {
    async fn next_job(&self) -> Result<Option<DispatchJob>, QueueError> {
        self.as_ref().next_job().await
    }
}
