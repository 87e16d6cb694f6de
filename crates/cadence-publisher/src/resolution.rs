//! Failure classification and the retry/backoff decision.
//!
//! Every failure path -- remote HTTP errors, transient I/O, store errors,
//! unexpected conditions -- funnels through one decision: retry once after a
//! fixed delay, or fail terminally. Kinds that can never succeed carry the
//! retry sentinel and fail in a single step.

use serde_json::json;

use cadence_graph::GraphError;
use cadence_model::{codes, PipelineConfig, DISABLED_RETRY_SENTINEL};

/// A classified failure: the persisted error code, the diagnostic payload
/// merged onto the post, and the retry count the decision should use
/// (the sentinel forces terminal failure regardless of the budget).
#[derive(Debug, Clone)]
pub struct FailureInfo {
    pub code: String,
    pub payload: serde_json::Value,
    pub effective_retry_count: Option<i32>,
}

impl FailureInfo {
    pub fn new(code: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            code: code.into(),
            payload,
            effective_retry_count: None,
        }
    }

    /// Force terminal failure in one resolution, bypassing the retry budget.
    pub fn terminal(code: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            code: code.into(),
            payload,
            effective_retry_count: Some(DISABLED_RETRY_SENTINEL),
        }
    }
}

/// How a failed attempt resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Back to `scheduled`, claimable again after the fixed delay.
    Retry { delay_secs: u64 },
    /// Terminal `failed`.
    Fail,
}

/// Decide retry-vs-fail from the post's retry count and the configured
/// budget. `retry_count` strictly increases across retries, so a budget of
/// one yields exactly one retry.
pub fn resolve_failure(retry_count: i32, config: &PipelineConfig) -> Resolution {
    if retry_count < config.retry_budget {
        Resolution::Retry {
            delay_secs: config.retry_delay_secs,
        }
    } else {
        Resolution::Fail
    }
}

/// Map a Graph client error to its persisted code and diagnostic payload.
pub fn classify_graph_error(err: &GraphError) -> FailureInfo {
    match err {
        GraphError::Status { status, body } => {
            FailureInfo::new(codes::http_status(*status), body.clone())
        }
        GraphError::RateLimited { retry_after_secs } => FailureInfo::new(
            codes::http_status(429),
            json!({ "retry_after_secs": retry_after_secs }),
        ),
        GraphError::Network(e) => {
            FailureInfo::new(codes::TRANSIENT_IO, json!({ "message": e.to_string() }))
        }
        GraphError::ProcessingFailed { status } => FailureInfo::new(
            codes::VIDEO_PROCESSING_ERROR,
            json!({ "status_code": status }),
        ),
        GraphError::ProcessingTimeout { last } => FailureInfo::new(
            codes::VIDEO_PROCESSING_TIMEOUT,
            json!({ "last_status": last }),
        ),
        GraphError::MissingCreationId { body } => {
            FailureInfo::new(codes::EXCEPTION, body.clone())
        }
        GraphError::InvalidResponse(msg) => {
            FailureInfo::new(codes::EXCEPTION, json!({ "message": msg }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn test_first_failure_retries_after_fixed_delay() {
        assert_eq!(
            resolve_failure(0, &config()),
            Resolution::Retry { delay_secs: 600 }
        );
    }

    #[test]
    fn test_second_failure_is_terminal() {
        // Budget of one: retry_count 1 means the single retry was spent.
        assert_eq!(resolve_failure(1, &config()), Resolution::Fail);
        assert_eq!(resolve_failure(5, &config()), Resolution::Fail);
    }

    #[test]
    fn test_sentinel_is_terminal_in_one_step() {
        assert_eq!(resolve_failure(DISABLED_RETRY_SENTINEL, &config()), Resolution::Fail);
    }

    #[test]
    fn test_larger_budget_allows_more_retries() {
        let config = PipelineConfig {
            retry_budget: 3,
            ..PipelineConfig::default()
        };
        assert!(matches!(resolve_failure(2, &config), Resolution::Retry { .. }));
        assert_eq!(resolve_failure(3, &config), Resolution::Fail);
    }

    #[test]
    fn test_http_error_code_carries_status() {
        let info = classify_graph_error(&GraphError::Status {
            status: 500,
            body: serde_json::json!({ "error": "boom" }),
        });
        assert_eq!(info.code, "http_500");
        assert_eq!(info.payload["error"], "boom");
        assert!(info.effective_retry_count.is_none());
    }

    #[test]
    fn test_rate_limit_maps_to_http_429() {
        let info = classify_graph_error(&GraphError::RateLimited {
            retry_after_secs: Some(12),
        });
        assert_eq!(info.code, "http_429");
        assert_eq!(info.payload["retry_after_secs"], 12);
    }

    #[test]
    fn test_processing_timeout_keeps_last_status() {
        let info = classify_graph_error(&GraphError::ProcessingTimeout {
            last: Some("IN_PROGRESS".to_string()),
        });
        assert_eq!(info.code, "video_processing_timeout");
        assert_eq!(info.payload["last_status"], "IN_PROGRESS");
    }

    #[test]
    fn test_terminal_failure_info_carries_sentinel() {
        let info = FailureInfo::terminal(codes::DISABLED, serde_json::json!({}));
        assert_eq!(info.effective_retry_count, Some(DISABLED_RETRY_SENTINEL));
    }
}
