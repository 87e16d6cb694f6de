//! Port traits the pipeline components consume.
//!
//! Each component depends only on the operations it needs; [`crate::PgStore`]
//! implements all three. Tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cadence_model::{ClaimedPost, Credential, NewPost, PostSnapshot, PostStatus, PublishTask};

use crate::StoreError;

/// Result of an idempotent insert: either a fresh row or an update of the
/// row that already carried the same `(account_id, client_request_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i64),
    Updated(i64),
}

impl InsertOutcome {
    /// The affected row id, whichever way the upsert went.
    pub fn id(&self) -> i64 {
        match self {
            InsertOutcome::Created(id) | InsertOutcome::Updated(id) => *id,
        }
    }
}

/// An existing active post that sits too close to a requested time.
#[derive(Debug, Clone)]
pub struct ConflictInfo {
    pub id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
}

/// Capacity and booking operations used by the planner.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Count active-status posts for an account inside `[from, to)`.
    async fn committed_count(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Scheduled times of active-status posts inside `[from, to)`, ascending.
    async fn committed_times(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError>;

    /// Cancel up to `count` of the most-recently-scheduled (newest first)
    /// `scheduled`/`queued` posts inside `[from, to)`. Returns how many rows
    /// were canceled.
    async fn cancel_newest(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        count: usize,
    ) -> Result<u64, StoreError>;

    /// Nearest active-status post within `spacing_minutes` of `at`, if any.
    async fn spacing_conflict(
        &self,
        account_id: i64,
        at: DateTime<Utc>,
        spacing_minutes: i64,
    ) -> Result<Option<ConflictInfo>, StoreError>;

    /// Idempotent insert keyed on `(account_id, client_request_id)` when the
    /// request id is present; a repeat updates the existing row in place.
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, StoreError>;
}

/// Claim and recovery operations used by the scheduler loop.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Atomically move due `scheduled` posts on active accounts to `queued`,
    /// stamping a fresh lock and the deterministic job id. Rows are claimed
    /// in ascending `(scheduled_at, id)` order, at most `limit` per call.
    async fn claim_due(
        &self,
        lookahead_secs: u64,
        limit: i64,
    ) -> Result<Vec<ClaimedPost>, StoreError>;

    /// Return posts stuck in `publishing`/`queued` past their staleness
    /// timeout to `scheduled`, incrementing `retry_count` and tagging
    /// `error_code = stuck_recovered`. Returns the number reclaimed.
    ///
    /// A reaped `publishing` post may have succeeded remotely just before its
    /// worker died; re-publishing it is an accepted at-least-once risk.
    async fn reap_stuck(
        &self,
        publishing_after_secs: u64,
        queued_after_secs: u64,
    ) -> Result<u64, StoreError>;

    /// The store's current clock, for drift measurement against the process
    /// clock. Claim and reap cutoffs are evaluated on the store's clock.
    async fn clock(&self) -> Result<DateTime<Utc>, StoreError>;
}

/// State-machine operations used by publish workers.
#[async_trait]
pub trait PublishStore: Send + Sync {
    /// Atomic claim: `queued -> publishing` with a fresh lock owned by
    /// `worker_id`. Returns `None` when another worker already won the row
    /// (or it was deleted); callers treat that as a no-op, not an error.
    async fn begin_publishing(
        &self,
        post_id: i64,
        worker_id: &str,
    ) -> Result<Option<PublishTask>, StoreError>;

    /// Refresh the lock so the reaper leaves a legitimately long publish
    /// alone. Must run well under the publishing staleness timeout.
    async fn heartbeat(&self, post_id: i64, worker_id: &str) -> Result<(), StoreError>;

    /// Resolve to `published`: store the result payload, zero the retry
    /// count, clear error and lock fields.
    async fn save_published(
        &self,
        post_id: i64,
        result: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Resolve to a retry: back to `scheduled` with `retry_count + 1`,
    /// `next_attempt_at = now + delay`, diagnostics merged, locks cleared.
    async fn schedule_retry(
        &self,
        post_id: i64,
        code: &str,
        payload: &serde_json::Value,
        delay_secs: u64,
    ) -> Result<(), StoreError>;

    /// Resolve to terminal `failed` with `retry_count + 1`, diagnostics
    /// merged, locks cleared.
    async fn mark_failed(
        &self,
        post_id: i64,
        code: &str,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Credential for an account, `None` if the account is missing or
    /// paused.
    async fn load_credential(&self, account_id: i64) -> Result<Option<Credential>, StoreError>;

    /// The account's most recent posts by last update, newest first.
    async fn recent_posts(
        &self,
        account_id: i64,
        limit: usize,
    ) -> Result<Vec<PostSnapshot>, StoreError>;

    /// Flip the account's pause switch off.
    async fn pause_account(&self, account_id: i64) -> Result<(), StoreError>;

    /// Force-fail every remaining `scheduled` post for the account with the
    /// given error code, so the backlog surfaces instead of silently burning
    /// retries. Returns the number of posts failed.
    async fn fail_scheduled(&self, account_id: i64, code: &str) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T: ClaimStore + ?Sized> ClaimStore for std::sync::Arc<T> {
    async fn claim_due(
        &self,
        lookahead_secs: u64,
        limit: i64,
    ) -> Result<Vec<ClaimedPost>, StoreError> {
        self.as_ref().claim_due(lookahead_secs, limit).await
    }

    async fn reap_stuck(
        &self,
        publishing_after_secs: u64,
        queued_after_secs: u64,
    ) -> Result<u64, StoreError> {
        self.as_ref()
            .reap_stuck(publishing_after_secs, queued_after_secs)
            .await
    }

    async fn clock(&self) -> Result<DateTime<Utc>, StoreError> {
        self.as_ref().clock().await
    }
}

#[async_trait]
impl<T: PublishStore + ?Sized> PublishStore for std::sync::Arc<T> {
    async fn begin_publishing(
        &self,
        post_id: i64,
        worker_id: &str,
    ) -> Result<Option<PublishTask>, StoreError> {
        self.as_ref().begin_publishing(post_id, worker_id).await
    }

    async fn heartbeat(&self, post_id: i64, worker_id: &str) -> Result<(), StoreError> {
        self.as_ref().heartbeat(post_id, worker_id).await
    }

    async fn save_published(
        &self,
        post_id: i64,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.as_ref().save_published(post_id, result).await
    }

    async fn schedule_retry(
        &self,
        post_id: i64,
        code: &str,
        payload: &serde_json::Value,
        delay_secs: u64,
    ) -> Result<(), StoreError> {
        self.as_ref()
            .schedule_retry(post_id, code, payload, delay_secs)
            .await
    }

    async fn mark_failed(
        &self,
        post_id: i64,
        code: &str,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.as_ref().mark_failed(post_id, code, payload).await
    }

    async fn load_credential(&self, account_id: i64) -> Result<Option<Credential>, StoreError> {
        self.as_ref().load_credential(account_id).await
    }

    async fn recent_posts(
        &self,
        account_id: i64,
        limit: usize,
    ) -> Result<Vec<PostSnapshot>, StoreError> {
        self.as_ref().recent_posts(account_id, limit).await
    }

    async fn pause_account(&self, account_id: i64) -> Result<(), StoreError> {
        self.as_ref().pause_account(account_id).await
    }

    async fn fail_scheduled(&self, account_id: i64, code: &str) -> Result<u64, StoreError> {
        self.as_ref().fail_scheduled(account_id, code).await
    }
}
