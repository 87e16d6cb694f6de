//! In-memory `PublishStore` fake for publisher tests.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Mutex;

use async_trait::async_trait;
use cadence_model::{Credential, PostSnapshot, PublishTask};
use cadence_store::{PublishStore, StoreError};

/// Records every state-machine interaction; `begin_publishing` hands out the
/// configured task exactly once, mirroring the conditional update's
/// single-winner guarantee.
pub struct FakePublishStore {
    pub task: Mutex<Option<PublishTask>>,
    pub credential: Mutex<Option<Credential>>,
    pub heartbeats: AtomicUsize,
    pub saved: Mutex<Option<serde_json::Value>>,
    /// (post_id, code, delay_secs) per scheduled retry.
    pub retries: Mutex<Vec<(i64, String, u64)>>,
    /// (post_id, code) per terminal failure.
    pub failures: Mutex<Vec<(i64, String)>>,
    pub recent: Mutex<Vec<PostSnapshot>>,
    pub paused: AtomicBool,
    /// Error code used to force-fail the scheduled backlog, if it happened.
    pub backlog_failed_with: Mutex<Option<String>>,
}

impl FakePublishStore {
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
            credential: Mutex::new(Some(Credential {
                platform_user_id: "uid-1".to_string(),
                access_token: "token".to_string(),
            })),
            heartbeats: AtomicUsize::new(0),
            saved: Mutex::new(None),
            retries: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            recent: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            backlog_failed_with: Mutex::new(None),
        }
    }

    pub fn with_task(task: PublishTask) -> Self {
        let store = Self::new();
        *store.task.lock().unwrap() = Some(task);
        store
    }
}

#[async_trait]
impl PublishStore for FakePublishStore {
    async fn begin_publishing(
        &self,
        _post_id: i64,
        _worker_id: &str,
    ) -> Result<Option<PublishTask>, StoreError> {
        Ok(self.task.lock().unwrap().take())
    }

    async fn heartbeat(&self, _post_id: i64, _worker_id: &str) -> Result<(), StoreError> {
        self.heartbeats
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn save_published(
        &self,
        _post_id: i64,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        *self.saved.lock().unwrap() = Some(result.clone());
        Ok(())
    }

    async fn schedule_retry(
        &self,
        post_id: i64,
        code: &str,
        _payload: &serde_json::Value,
        delay_secs: u64,
    ) -> Result<(), StoreError> {
        self.retries
            .lock()
            .unwrap()
            .push((post_id, code.to_string(), delay_secs));
        Ok(())
    }

    async fn mark_failed(
        &self,
        post_id: i64,
        code: &str,
        _payload: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.failures.lock().unwrap().push((post_id, code.to_string()));
        Ok(())
    }

    async fn load_credential(&self, _account_id: i64) -> Result<Option<Credential>, StoreError> {
        Ok(self.credential.lock().unwrap().clone())
    }

    async fn recent_posts(
        &self,
        _account_id: i64,
        limit: usize,
    ) -> Result<Vec<PostSnapshot>, StoreError> {
        let recent = self.recent.lock().unwrap();
        Ok(recent.iter().take(limit).cloned().collect())
    }

    async fn pause_account(&self, _account_id: i64) -> Result<(), StoreError> {
        self.paused.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn fail_scheduled(&self, _account_id: i64, code: &str) -> Result<u64, StoreError> {
        *self.backlog_failed_with.lock().unwrap() = Some(code.to_string());
        Ok(2)
    }
}
