//! Graph API response types.

use serde::Deserialize;

/// A freshly created media container, keeping the raw response body for the
/// post's diagnostic payload.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub id: String,
    pub body: serde_json::Value,
}

/// Processing state of a media container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    /// Upload processed; ready to publish.
    Finished,
    /// Already published.
    Published,
    /// Still processing.
    InProgress,
    /// Processing failed.
    Error,
    /// Upload failed.
    Failed,
    /// A status code this client does not know; treated as still-processing.
    Other(String),
}

impl ContainerStatus {
    pub fn from_code(code: &str) -> Self {
        match code {
            "FINISHED" => ContainerStatus::Finished,
            "PUBLISHED" => ContainerStatus::Published,
            "IN_PROGRESS" => ContainerStatus::InProgress,
            "ERROR" => ContainerStatus::Error,
            "FAILED" => ContainerStatus::Failed,
            other => ContainerStatus::Other(other.to_string()),
        }
    }

    /// Ready to publish (or already published).
    pub fn is_ready(&self) -> bool {
        matches!(self, ContainerStatus::Finished | ContainerStatus::Published)
    }

    /// Processing ended in failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, ContainerStatus::Error | ContainerStatus::Failed)
    }

    /// The raw status code string, for diagnostics.
    pub fn code(&self) -> &str {
        match self {
            ContainerStatus::Finished => "FINISHED",
            ContainerStatus::Published => "PUBLISHED",
            ContainerStatus::InProgress => "IN_PROGRESS",
            ContainerStatus::Error => "ERROR",
            ContainerStatus::Failed => "FAILED",
            ContainerStatus::Other(code) => code,
        }
    }
}

/// Body of a container status poll.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    pub status_code: Option<String>,
}

/// Body of a container create call.
#[derive(Debug, Deserialize)]
pub(crate) struct CreateBody {
    pub id: Option<String>,
}
