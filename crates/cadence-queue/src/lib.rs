//! Dispatch-queue ports and adapters.
//!
//! The queue is a best-effort at-least-once substrate: the claimer enqueues
//! each claimed post under a deterministic job id, and redundant enqueues of
//! the same id collapse into a duplicate outcome. Idempotency of the pipeline
//! comes from the store's conditional transitions, never from the queue.

mod error;
mod job;
mod memory;
mod redis_queue;

pub use error::QueueError;
pub use job::{DispatchJob, Enqueue, JobQueue, JobSource};
pub use memory::MemoryQueue;
pub use redis_queue::RedisQueue;
