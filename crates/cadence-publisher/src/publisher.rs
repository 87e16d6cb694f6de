//! The publish state machine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use cadence_graph::{GraphClient, GraphError};
use cadence_model::{codes, Credential, PipelineConfig, PostKind, PublishTask};
use cadence_store::{PublishStore, StoreError};

use crate::pause::maybe_auto_pause;
use crate::resolution::{classify_graph_error, resolve_failure, FailureInfo, Resolution};
use crate::resolve_media_url;

/// Overall deadline for the video processing wait. Heartbeats run between
/// polls, so the lock stays fresh for the whole wait even though it exceeds
/// the publishing staleness timeout.
const VIDEO_WAIT_DEADLINE: Duration = Duration::from_secs(300);

/// Interval between container status polls.
const VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Per-worker options.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Lock owner identity stamped into `locked_by`.
    pub worker_id: String,
    /// Base URL relative media references resolve against.
    pub public_base_url: String,
    /// Fabricate a success payload instead of calling the platform.
    pub mock_publish: bool,
}

/// How a publish attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Remote publish succeeded and the post is `published`.
    Published,
    /// Attempt failed; the post went back to `scheduled` for one retry.
    Retried { code: String },
    /// Attempt failed terminally; the post is `failed`.
    Failed { code: String },
    /// The post was not `queued` anymore -- another worker won the claim or
    /// the post was deleted. A no-op, not an error.
    Lost,
}

/// Publishes one post at a time: claims it, performs the remote operation
/// for its kind, and resolves the outcome through the retry budget.
pub struct Publisher<S> {
    store: S,
    graph: GraphClient,
    config: Arc<PipelineConfig>,
    options: WorkerOptions,
}

impl<S: PublishStore> Publisher<S> {
    pub fn new(
        store: S,
        graph: GraphClient,
        config: Arc<PipelineConfig>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            store,
            graph,
            config,
            options,
        }
    }

    /// Process one dispatched post end to end.
    ///
    /// Errors are only returned when the resolution itself cannot be
    /// persisted; everything else resolves into an outcome on the post.
    pub async fn publish_one(&self, post_id: i64) -> Result<PublishOutcome, StoreError> {
        let Some(task) = self
            .store
            .begin_publishing(post_id, &self.options.worker_id)
            .await?
        else {
            debug!(post_id, "post not queued; lost the claim or deleted");
            return Ok(PublishOutcome::Lost);
        };

        let outcome = match self.attempt(&task).await {
            Ok(result) => {
                self.store.save_published(task.id, &result).await?;
                info!(post_id = task.id, account_id = task.account_id, "post published");
                PublishOutcome::Published
            }
            Err(failure) => self.resolve(&task, failure).await?,
        };

        // Refresh the lock once more after resolution.
        if let Err(e) = self.store.heartbeat(task.id, &self.options.worker_id).await {
            warn!(post_id = task.id, error = %e, "post-resolution heartbeat failed");
        }

        Ok(outcome)
    }

    /// Route a classified failure through the retry budget.
    async fn resolve(
        &self,
        task: &PublishTask,
        failure: FailureInfo,
    ) -> Result<PublishOutcome, StoreError> {
        let effective = failure.effective_retry_count.unwrap_or(task.retry_count);
        match resolve_failure(effective, &self.config) {
            Resolution::Retry { delay_secs } => {
                self.store
                    .schedule_retry(task.id, &failure.code, &failure.payload, delay_secs)
                    .await?;
                warn!(
                    post_id = task.id,
                    code = %failure.code,
                    delay_secs,
                    "publish failed, retry scheduled"
                );
                Ok(PublishOutcome::Retried { code: failure.code })
            }
            Resolution::Fail => {
                self.store
                    .mark_failed(task.id, &failure.code, &failure.payload)
                    .await?;
                error!(post_id = task.id, code = %failure.code, "publish failed terminally");

                if let Err(e) = maybe_auto_pause(&self.store, task.account_id, &self.config).await
                {
                    warn!(account_id = task.account_id, error = %e, "auto-pause check failed");
                }
                Ok(PublishOutcome::Failed { code: failure.code })
            }
        }
    }

    /// The publish attempt proper: credential gate, heartbeat, then the
    /// remote operation for the post's kind.
    async fn attempt(&self, task: &PublishTask) -> Result<serde_json::Value, FailureInfo> {
        let credential = match self.store.load_credential(task.account_id).await {
            Ok(Some(c)) if c.is_usable() => c,
            Ok(_) => {
                return Err(FailureInfo::new(
                    codes::MISSING_ACCESS_TOKEN,
                    json!({ "message": "no active account or token" }),
                ));
            }
            Err(e) => {
                return Err(FailureInfo::new(
                    codes::DB_ERROR,
                    json!({ "message": e.to_string() }),
                ));
            }
        };

        if let Err(e) = self
            .store
            .heartbeat(task.id, &self.options.worker_id)
            .await
        {
            return Err(FailureInfo::new(
                codes::DB_ERROR,
                json!({ "message": e.to_string() }),
            ));
        }

        if self.options.mock_publish {
            return Ok(json!({ "mock": true, "post_type": task.kind }));
        }

        let kind: PostKind = task.kind.parse().map_err(|_| {
            FailureInfo::terminal(
                codes::UNSUPPORTED_POST_TYPE,
                json!({ "post_type": task.kind }),
            )
        })?;

        let media_url = resolve_media_url(&self.options.public_base_url, &task.media_url);

        match kind {
            PostKind::Photo => self
                .publish_photo(task, &credential, &media_url)
                .await
                .map_err(|e| classify_graph_error(&e)),
            PostKind::ReelFeed | PostKind::ReelOnly => self
                .publish_reel(task, &credential, &media_url, kind == PostKind::ReelFeed)
                .await
                .map_err(|e| classify_graph_error(&e)),
            PostKind::Carousel => Err(FailureInfo::terminal(
                codes::DISABLED,
                json!({ "message": "carousels_disabled" }),
            )),
        }
    }

    async fn publish_photo(
        &self,
        task: &PublishTask,
        credential: &Credential,
        image_url: &str,
    ) -> Result<serde_json::Value, GraphError> {
        let container = self
            .graph
            .create_image_container(
                &credential.platform_user_id,
                &credential.access_token,
                image_url,
                &task.caption,
            )
            .await?;

        let published = self
            .graph
            .publish_container(
                &credential.platform_user_id,
                &credential.access_token,
                &container.id,
                false,
            )
            .await?;

        Ok(json!({
            "step1": container.body,
            "step2": published,
            "image_url": image_url,
            "caption": task.caption,
        }))
    }

    async fn publish_reel(
        &self,
        task: &PublishTask,
        credential: &Credential,
        video_url: &str,
        share_to_feed: bool,
    ) -> Result<serde_json::Value, GraphError> {
        let container = self
            .graph
            .create_reel_container(
                &credential.platform_user_id,
                &credential.access_token,
                video_url,
                &task.caption,
                share_to_feed,
            )
            .await?;

        self.wait_container_ready(task.id, &container.id, &credential.access_token)
            .await?;

        let published = self
            .graph
            .publish_container(
                &credential.platform_user_id,
                &credential.access_token,
                &container.id,
                true,
            )
            .await?;

        Ok(json!({
            "step1": container.body,
            "step2": published,
            "video_url": video_url,
            "caption": task.caption,
            "share_to_feed": share_to_feed,
        }))
    }

    /// Poll the container until the platform finishes processing, with lock
    /// heartbeats between polls so the reaper leaves a legitimately busy
    /// post alone. The wait has its own deadline, independent of the lock
    /// staleness timeout.
    async fn wait_container_ready(
        &self,
        post_id: i64,
        container_id: &str,
        access_token: &str,
    ) -> Result<(), GraphError> {
        let deadline = tokio::time::Instant::now() + VIDEO_WAIT_DEADLINE;
        let mut last: Option<String> = None;

        loop {
            let status = self.graph.container_status(container_id, access_token).await?;
            if status.is_ready() {
                return Ok(());
            }
            if status.is_failure() {
                return Err(GraphError::ProcessingFailed {
                    status: status.code().to_string(),
                });
            }
            last = Some(status.code().to_string());

            if let Err(e) = self.store.heartbeat(post_id, &self.options.worker_id).await {
                warn!(post_id, error = %e, "heartbeat during processing wait failed");
            }

            if tokio::time::Instant::now() + VIDEO_POLL_INTERVAL > deadline {
                return Err(GraphError::ProcessingTimeout { last });
            }
            tokio::time::sleep(VIDEO_POLL_INTERVAL).await;
        }
    }
}
