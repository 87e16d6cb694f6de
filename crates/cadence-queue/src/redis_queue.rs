//! Redis-backed dispatch queue.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use crate::{DispatchJob, Enqueue, JobQueue, JobSource, QueueError};

/// How long a job's dedup marker survives after enqueue. Mirrors the
/// dispatcher's result TTL: once expired, the same job id may be enqueued
/// again (at-least-once delivery).
const DEDUP_TTL_SECS: u64 = 3600;

/// Blocking-pop wait before `next_job` returns `None`.
const POLL_TIMEOUT_SECS: f64 = 1.0;

/// Named queue on a shared redis instance.
///
/// Layout: jobs are JSON frames on a list (`cadence:queue:{name}`); each
/// enqueue first takes a `SET NX EX` marker keyed by job id, so redundant
/// dispatch attempts for a post collapse to [`Enqueue::Duplicate`].
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    list_key: String,
    marker_prefix: String,
}

impl RedisQueue {
    /// Connect to redis and bind to the named queue.
    pub async fn connect(redis_url: &str, name: &str) -> Result<Self, QueueError> {
        info!(name, "connecting to redis queue");
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            list_key: format!("cadence:queue:{name}"),
            marker_prefix: format!("cadence:queue:{name}:job:"),
        })
    }

    fn marker_key(&self, job_id: &str) -> String {
        format!("{}{}", self.marker_prefix, job_id)
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: &DispatchJob) -> Result<Enqueue, QueueError> {
        let mut conn = self.conn.clone();

        // SET NX EX: one winner per job id until the marker expires.
        let taken: Option<String> = redis::cmd("SET")
            .arg(self.marker_key(&job.job_id))
            .arg(job.post_id)
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async(&mut conn)
            .await?;

        if taken.is_none() {
            debug!(job_id = %job.job_id, "enqueue deduplicated");
            return Ok(Enqueue::Duplicate);
        }

        let frame = serde_json::to_string(job)?;
        let _: () = conn.lpush(&self.list_key, frame).await?;
        debug!(job_id = %job.job_id, post_id = job.post_id, "job enqueued");
        Ok(Enqueue::Queued)
    }
}

#[async_trait]
impl JobSource for RedisQueue {
    async fn next_job(&self) -> Result<Option<DispatchJob>, QueueError> {
        let mut conn = self.conn.clone();

        let popped: Option<(String, String)> =
            conn.brpop(&self.list_key, POLL_TIMEOUT_SECS).await?;

        match popped {
            Some((_key, frame)) => {
                let job: DispatchJob = serde_json::from_str(&frame)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }
}
