//! Error types for the Graph client.

use thiserror::Error;

/// Errors that can occur when talking to the publish API.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Network-level failure (connect, timeout, TLS, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status with the response body preserved for
    /// diagnostics.
    #[error("graph API error: HTTP {status}")]
    Status {
        status: u16,
        body: serde_json::Value,
    },

    /// Rate limited.
    #[error("rate limited{}", match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    })]
    RateLimited { retry_after_secs: Option<u64> },

    /// Container creation returned a body without an id.
    #[error("container creation returned no id")]
    MissingCreationId { body: serde_json::Value },

    /// Remote video processing reported a failure state.
    #[error("video processing failed: {status}")]
    ProcessingFailed { status: String },

    /// Remote video processing did not finish before the deadline.
    #[error("video processing timed out (last status: {last:?})")]
    ProcessingTimeout { last: Option<String> },

    /// Response body was not the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GraphError {
    /// Whether a retry after a delay has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            GraphError::Network(_) | GraphError::RateLimited { .. } => true,
            GraphError::Status { status, .. } => {
                *status == 429 || (500..=599).contains(status)
            }
            GraphError::ProcessingTimeout { .. } => true,
            GraphError::MissingCreationId { .. }
            | GraphError::ProcessingFailed { .. }
            | GraphError::InvalidResponse(_) => false,
        }
    }
}
