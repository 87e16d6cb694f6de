//! Account auto-pause after repeated failures.

use tracing::warn;

use cadence_model::{codes, PipelineConfig, PostStatus};
use cadence_store::{PublishStore, StoreError};

/// A post only counts toward auto-pause once it burned through its retries.
const MIN_FAILED_RETRIES: i32 = 2;

/// Pause the account if its most recent posts all ended in exhausted
/// failure, force-failing the remaining `scheduled` backlog so it surfaces
/// immediately instead of silently burning per-post retry delay.
///
/// The window is the last N posts by update time, which can include
/// non-publish updates diluting the signal; that caveat is accepted.
/// Returns true when the account was paused.
pub async fn maybe_auto_pause<S: PublishStore>(
    store: &S,
    account_id: i64,
    config: &PipelineConfig,
) -> Result<bool, StoreError> {
    let threshold = config.pause_after_consecutive_failures;
    let recent = store.recent_posts(account_id, threshold).await?;
    if recent.len() < threshold {
        return Ok(false);
    }

    let all_failed = recent
        .iter()
        .all(|p| p.status == PostStatus::Failed && p.retry_count >= MIN_FAILED_RETRIES);
    if !all_failed {
        return Ok(false);
    }

    store.pause_account(account_id).await?;
    let failed = store
        .fail_scheduled(account_id, codes::ACCOUNT_PAUSED)
        .await?;
    warn!(
        account_id,
        consecutive_failures = threshold,
        backlog_failed = failed,
        "account auto-paused after repeated publish failures"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakePublishStore;
    use cadence_model::PostSnapshot;
    use std::sync::atomic::Ordering;

    fn snapshot(id: i64, status: PostStatus, retry_count: i32) -> PostSnapshot {
        PostSnapshot {
            id,
            status,
            retry_count,
            error_code: None,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn test_too_little_history_does_not_pause() {
        let store = FakePublishStore::new();
        *store.recent.lock().unwrap() = vec![
            snapshot(1, PostStatus::Failed, 2),
            snapshot(2, PostStatus::Failed, 2),
        ];

        assert!(!maybe_auto_pause(&store, 1, &config()).await.unwrap());
        assert!(!store.paused.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_one_healthy_post_blocks_pause() {
        let store = FakePublishStore::new();
        *store.recent.lock().unwrap() = vec![
            snapshot(1, PostStatus::Failed, 2),
            snapshot(2, PostStatus::Published, 0),
            snapshot(3, PostStatus::Failed, 2),
        ];

        assert!(!maybe_auto_pause(&store, 1, &config()).await.unwrap());
        assert!(!store.paused.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failures_without_exhausted_retries_do_not_pause() {
        let store = FakePublishStore::new();
        *store.recent.lock().unwrap() = vec![
            snapshot(1, PostStatus::Failed, 1),
            snapshot(2, PostStatus::Failed, 2),
            snapshot(3, PostStatus::Failed, 2),
        ];

        assert!(!maybe_auto_pause(&store, 1, &config()).await.unwrap());
    }

    #[tokio::test]
    async fn test_exhausted_failure_streak_pauses_and_fails_backlog() {
        let store = FakePublishStore::new();
        *store.recent.lock().unwrap() = vec![
            snapshot(1, PostStatus::Failed, 2),
            snapshot(2, PostStatus::Failed, 3),
            snapshot(3, PostStatus::Failed, 2),
        ];

        assert!(maybe_auto_pause(&store, 1, &config()).await.unwrap());
        assert!(store.paused.load(Ordering::SeqCst));
        assert_eq!(
            store.backlog_failed_with.lock().unwrap().as_deref(),
            Some("account_paused")
        );
    }
}
