//! Single-post creation with spacing enforcement.

use chrono::{DateTime, Utc};

use cadence_model::{NewPost, PipelineConfig, PostKind};
use cadence_store::{BookingStore, InsertOutcome};

use crate::PlannerError;

/// A direct (non-batch) post creation request.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub account_id: i64,
    pub kind: PostKind,
    pub media_url: String,
    pub caption: String,
    pub scheduled_at: DateTime<Utc>,
    /// Idempotency key; a repeat with the same key updates in place.
    pub client_request_id: Option<String>,
    /// Skip the minimum-spacing check.
    pub override_spacing: bool,
}

/// Create one post, rejecting it when another active post sits within the
/// minimum spacing (unless overridden at creation time).
pub async fn create_post<S: BookingStore>(
    store: &S,
    config: &PipelineConfig,
    req: &CreateRequest,
) -> Result<InsertOutcome, PlannerError> {
    if !req.override_spacing {
        if let Some(conflict) = store
            .spacing_conflict(req.account_id, req.scheduled_at, config.min_spacing_minutes)
            .await?
        {
            return Err(PlannerError::SpacingConflict {
                conflict,
                min_spacing_minutes: config.min_spacing_minutes,
            });
        }
    }

    let post = NewPost {
        account_id: req.account_id,
        kind: req.kind,
        media_url: req.media_url.clone(),
        caption: req.caption.clone(),
        scheduled_at: req.scheduled_at,
        client_request_id: req.client_request_id.clone(),
    };

    Ok(store.insert_post(&post).await?)
}
