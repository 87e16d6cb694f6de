//! Error types for domain-level validation.

use thiserror::Error;

use crate::PostStatus;

/// Errors raised by domain type validation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A status transition not present in the lifecycle graph.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: PostStatus, to: PostStatus },

    /// A post kind string the pipeline does not recognize.
    #[error("unknown post kind: {0}")]
    UnknownPostKind(String),
}
