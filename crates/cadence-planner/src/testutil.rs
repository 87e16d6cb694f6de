//! In-memory `BookingStore` fake for planner tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use cadence_model::{NewPost, PostStatus};
use cadence_store::{BookingStore, ConflictInfo, InsertOutcome, StoreError};

#[derive(Debug, Clone)]
struct FakeBooking {
    id: i64,
    account_id: i64,
    scheduled_at: DateTime<Utc>,
    status: PostStatus,
    client_request_id: Option<String>,
}

/// Mirrors the Postgres adapter's booking semantics closely enough for the
/// committer's logic to be exercised without a database.
pub struct MemoryBooking {
    posts: Mutex<Vec<FakeBooking>>,
    next_id: AtomicI64,
}

impl MemoryBooking {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a row directly, bypassing spacing and capacity checks.
    pub fn seed(
        &self,
        account_id: i64,
        scheduled_at: DateTime<Utc>,
        status: PostStatus,
        client_request_id: Option<&str>,
    ) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.posts.lock().unwrap().push(FakeBooking {
            id,
            account_id,
            scheduled_at,
            status,
            client_request_id: client_request_id.map(|s| s.to_string()),
        });
        id
    }

    /// Total rows for the account, regardless of status.
    pub fn post_count(&self, account_id: i64) -> usize {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.account_id == account_id)
            .count()
    }

    /// Rows canceled for the account.
    pub fn canceled_count(&self, account_id: i64) -> usize {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.account_id == account_id && p.status == PostStatus::Canceled)
            .count()
    }

    /// Scheduled times of active rows for the account, ascending.
    pub fn active_times(&self, account_id: i64) -> Vec<DateTime<Utc>> {
        let mut times: Vec<_> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.account_id == account_id && p.status.is_active())
            .map(|p| p.scheduled_at)
            .collect();
        times.sort();
        times
    }
}

impl Default for MemoryBooking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for MemoryBooking {
    async fn committed_count(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.account_id == account_id
                    && p.status.is_active()
                    && p.scheduled_at >= from
                    && p.scheduled_at < to
            })
            .count())
    }

    async fn committed_times(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let mut times: Vec<_> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.account_id == account_id
                    && p.status.is_active()
                    && p.scheduled_at >= from
                    && p.scheduled_at < to
            })
            .map(|p| p.scheduled_at)
            .collect();
        times.sort();
        Ok(times)
    }

    async fn cancel_newest(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        count: usize,
    ) -> Result<u64, StoreError> {
        let mut posts = self.posts.lock().unwrap();
        let mut targets: Vec<(DateTime<Utc>, i64)> = posts
            .iter()
            .filter(|p| {
                p.account_id == account_id
                    && matches!(p.status, PostStatus::Scheduled | PostStatus::Queued)
                    && p.scheduled_at >= from
                    && p.scheduled_at < to
            })
            .map(|p| (p.scheduled_at, p.id))
            .collect();
        // Newest first.
        targets.sort_by(|a, b| b.cmp(a));
        targets.truncate(count);

        let ids: Vec<i64> = targets.into_iter().map(|(_, id)| id).collect();
        let mut canceled = 0u64;
        for p in posts.iter_mut() {
            if ids.contains(&p.id) {
                p.status = PostStatus::Canceled;
                canceled += 1;
            }
        }
        Ok(canceled)
    }

    async fn spacing_conflict(
        &self,
        account_id: i64,
        at: DateTime<Utc>,
        spacing_minutes: i64,
    ) -> Result<Option<ConflictInfo>, StoreError> {
        let pad = Duration::minutes(spacing_minutes);
        let mut hits: Vec<_> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.account_id == account_id
                    && p.status.is_active()
                    // BETWEEN in the SQL adapter: bounds are inclusive.
                    && (p.scheduled_at - at).abs() <= pad
            })
            .map(|p| ConflictInfo {
                id: p.id,
                scheduled_at: p.scheduled_at,
                status: p.status,
            })
            .collect();
        hits.sort_by_key(|c| c.scheduled_at);
        Ok(hits.into_iter().next())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, StoreError> {
        let mut posts = self.posts.lock().unwrap();

        if let Some(key) = &post.client_request_id {
            if let Some(existing) = posts.iter_mut().find(|p| {
                p.account_id == post.account_id && p.client_request_id.as_ref() == Some(key)
            }) {
                existing.scheduled_at = post.scheduled_at;
                return Ok(InsertOutcome::Updated(existing.id));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        posts.push(FakeBooking {
            id,
            account_id: post.account_id,
            scheduled_at: post.scheduled_at,
            status: PostStatus::Scheduled,
            client_request_id: post.client_request_id.clone(),
        });
        Ok(InsertOutcome::Created(id))
    }
}
