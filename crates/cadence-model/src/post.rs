//! Post records and the post lifecycle state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Retry count sentinel that forces terminal failure in a single resolution,
/// bypassing the normal retry budget. Used for post kinds that can never
/// succeed (administratively disabled or unimplemented).
pub const DISABLED_RETRY_SENTINEL: i32 = 999;

/// Current lifecycle state of a post.
///
/// The transition graph is a DAG with one controlled cycle:
/// `queued -> publishing -> scheduled` (retry) -> `queued` again. Every other
/// edge moves forward into one of the terminal states `published`, `failed`,
/// or `canceled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Waiting for its scheduled time.
    #[default]
    Scheduled,
    /// Claimed by the scheduler and handed to the dispatch queue.
    Queued,
    /// Claimed by a worker; the remote publish is in flight.
    Publishing,
    /// Remote publish succeeded.
    Published,
    /// Terminal failure after retry exhaustion (or forced failure).
    Failed,
    /// Removed from the plan before publishing.
    Canceled,
}

impl PostStatus {
    /// Stored string form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Queued => "queued",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Canceled => "canceled",
        }
    }

    /// True while the post still occupies a slot in the plan (counts toward
    /// spacing and daily-cap checks).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PostStatus::Scheduled | PostStatus::Queued | PostStatus::Publishing
        )
    }

    /// True once the post can never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PostStatus::Published | PostStatus::Failed | PostStatus::Canceled
        )
    }

    /// Whether the lifecycle graph contains an edge from `self` to `to`.
    pub fn can_transition(&self, to: PostStatus) -> bool {
        match (self, to) {
            // Claimed by the scheduler, force-failed on pause, or canceled.
            (PostStatus::Scheduled, PostStatus::Queued)
            | (PostStatus::Scheduled, PostStatus::Failed)
            | (PostStatus::Scheduled, PostStatus::Canceled) => true,
            // Claimed by a worker, reaped back, or canceled before pickup.
            (PostStatus::Queued, PostStatus::Publishing)
            | (PostStatus::Queued, PostStatus::Scheduled)
            | (PostStatus::Queued, PostStatus::Canceled) => true,
            // Resolved by the worker, or reaped back after a stale lock.
            (PostStatus::Publishing, PostStatus::Published)
            | (PostStatus::Publishing, PostStatus::Scheduled)
            | (PostStatus::Publishing, PostStatus::Failed) => true,
            // Terminal states have no outgoing edges.
            (PostStatus::Published, _)
            | (PostStatus::Failed, _)
            | (PostStatus::Canceled, _) => false,
            _ => false,
        }
    }

    /// Validate an edge, returning `InvalidTransition` if absent.
    pub fn transition(&self, to: PostStatus) -> Result<PostStatus, ModelError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(ModelError::InvalidTransition { from: *self, to })
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PostStatus::Scheduled),
            "queued" => Ok(PostStatus::Queued),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            "canceled" => Ok(PostStatus::Canceled),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

/// What the worker publishes for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    /// Single image.
    Photo,
    /// Video published as a reel and shared to the feed.
    ReelFeed,
    /// Video published as a reel only.
    ReelOnly,
    /// Multi-item carousel (administratively disabled).
    Carousel,
}

impl PostKind {
    /// Stored string form of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Photo => "photo",
            PostKind::ReelFeed => "reel_feed",
            PostKind::ReelOnly => "reel_only",
            PostKind::Carousel => "carousel",
        }
    }

    /// True for kinds that require the asynchronous processing wait.
    pub fn is_video(&self) -> bool {
        matches!(self, PostKind::ReelFeed | PostKind::ReelOnly)
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(PostKind::Photo),
            "reel_feed" => Ok(PostKind::ReelFeed),
            "reel_only" => Ok(PostKind::ReelOnly),
            "carousel" => Ok(PostKind::Carousel),
            other => Err(ModelError::UnknownPostKind(other.to_string())),
        }
    }
}

/// A full post row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub account_id: i64,
    pub kind: PostKind,
    /// Opaque media reference; may be relative to the public base URL.
    pub media_url: String,
    pub caption: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
    pub retry_count: i32,
    /// Gates re-claim after a retry; `None` means claimable immediately.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    /// Append-only diagnostic payload merged across attempts.
    pub publish_result: Option<serde_json::Value>,
    /// Lock heartbeat; staleness detection only, never business identity.
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    /// Dispatch-queue correlation id (`publish-{id}`).
    pub job_id: Option<String>,
    /// Idempotency key, unique per account when present.
    pub client_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub account_id: i64,
    pub kind: PostKind,
    pub media_url: String,
    pub caption: String,
    pub scheduled_at: DateTime<Utc>,
    pub client_request_id: Option<String>,
}

/// A post claimed into `queued` by the scheduler, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedPost {
    pub id: i64,
    pub job_id: String,
}

impl ClaimedPost {
    /// Deterministic dispatch correlation id, so redundant dispatch attempts
    /// for the same post collapse in the queue.
    pub fn job_id_for(post_id: i64) -> String {
        format!("publish-{post_id}")
    }
}

/// Row handed to a worker after the atomic claim into `publishing`.
///
/// `kind` is kept as the raw stored string; the worker parses it and treats
/// unknown values as a hard `unsupported_post_type` failure.
#[derive(Debug, Clone)]
pub struct PublishTask {
    pub id: i64,
    pub account_id: i64,
    pub kind: String,
    pub media_url: String,
    pub caption: String,
    pub retry_count: i32,
}

/// Minimal view of a post used by the auto-pause heuristic.
#[derive(Debug, Clone)]
pub struct PostSnapshot {
    pub id: i64,
    pub status: PostStatus,
    pub retry_count: i32,
    pub error_code: Option<String>,
}
