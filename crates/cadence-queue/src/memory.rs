//! In-memory dispatch queue for single-process deployments and tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{DispatchJob, Enqueue, JobQueue, JobSource, QueueError};

/// Matches the redis adapter's blocking-pop wait.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Unbounded in-process queue with the same dedup-by-job-id contract as
/// [`crate::RedisQueue`].
pub struct MemoryQueue {
    seen: Mutex<HashSet<String>>,
    tx: mpsc::UnboundedSender<DispatchJob>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<DispatchJob>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            seen: Mutex::new(HashSet::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Forget a job id so it can be enqueued again. The redis adapter gets
    /// this for free via marker expiry.
    pub fn release(&self, job_id: &str) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.remove(job_id);
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &DispatchJob) -> Result<Enqueue, QueueError> {
        {
            let mut seen = self.seen.lock().map_err(|_| QueueError::Closed)?;
            if !seen.insert(job.job_id.clone()) {
                return Ok(Enqueue::Duplicate);
            }
        }
        self.tx.send(job.clone()).map_err(|_| QueueError::Closed)?;
        Ok(Enqueue::Queued)
    }
}

#[async_trait]
impl JobSource for MemoryQueue {
    async fn next_job(&self) -> Result<Option<DispatchJob>, QueueError> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(POLL_TIMEOUT, rx.recv()).await {
            Ok(Some(job)) => Ok(Some(job)),
            Ok(None) => Err(QueueError::Closed),
            Err(_elapsed) => Ok(None),
        }
    }
}
