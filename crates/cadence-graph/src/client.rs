//! Graph API HTTP client.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{CreateBody, StatusBody};
use crate::{ContainerStatus, CreatedContainer, GraphError};

/// Per-call timeout for image endpoints.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-call timeout for video endpoints; uploads are ingested server-side,
/// so these calls run longer than image ones.
const VIDEO_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-call timeout for container status polls.
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Transient failures are retried this many times beyond the first attempt.
const TRANSIENT_RETRIES: u32 = 3;

/// Client for the Graph publish API.
///
/// The pipeline uses three semantics: create a media container, poll its
/// processing status, and publish it. The caller orchestrates the poll loop
/// so lock heartbeats can be interleaved with it.
pub struct GraphClient {
    http: Client,
    base_url: String,
    graph_version: String,
}

impl GraphClient {
    /// Create a client against the given API origin (the production Graph
    /// host, or a mock server in tests).
    pub fn new(base_url: impl Into<String>, graph_version: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("cadence/0.1")
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            graph_version: graph_version.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.graph_version, path)
    }

    /// Create an image container.
    pub async fn create_image_container(
        &self,
        user_id: &str,
        access_token: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<CreatedContainer, GraphError> {
        let body: serde_json::Value = self
            .execute("create_image_container", || {
                self.http
                    .post(self.url(&format!("{user_id}/media")))
                    .timeout(IMAGE_TIMEOUT)
                    .form(&[
                        ("image_url", image_url),
                        ("caption", caption),
                        ("access_token", access_token),
                    ])
            })
            .await?;
        Self::container_from(body)
    }

    /// Create a reel (video) container.
    pub async fn create_reel_container(
        &self,
        user_id: &str,
        access_token: &str,
        video_url: &str,
        caption: &str,
        share_to_feed: bool,
    ) -> Result<CreatedContainer, GraphError> {
        let body: serde_json::Value = self
            .execute("create_reel_container", || {
                self.http
                    .post(self.url(&format!("{user_id}/media")))
                    .timeout(VIDEO_TIMEOUT)
                    .form(&[
                        ("media_type", "REELS"),
                        ("video_url", video_url),
                        ("caption", caption),
                        ("share_to_feed", if share_to_feed { "true" } else { "false" }),
                        ("access_token", access_token),
                    ])
            })
            .await?;
        Self::container_from(body)
    }

    /// Poll a container's processing status.
    pub async fn container_status(
        &self,
        container_id: &str,
        access_token: &str,
    ) -> Result<ContainerStatus, GraphError> {
        let body: StatusBody = self
            .execute("container_status", || {
                self.http
                    .get(self.url(container_id))
                    .timeout(STATUS_TIMEOUT)
                    .query(&[("fields", "status_code"), ("access_token", access_token)])
            })
            .await?;

        let code = body.status_code.ok_or_else(|| {
            GraphError::InvalidResponse("status poll returned no status_code".to_string())
        })?;
        debug!(container_id, status = %code, "container status");
        Ok(ContainerStatus::from_code(&code))
    }

    /// Publish a processed container.
    pub async fn publish_container(
        &self,
        user_id: &str,
        access_token: &str,
        creation_id: &str,
        video: bool,
    ) -> Result<serde_json::Value, GraphError> {
        let timeout = if video { VIDEO_TIMEOUT } else { IMAGE_TIMEOUT };
        self.execute("publish_container", || {
            self.http
                .post(self.url(&format!("{user_id}/media_publish")))
                .timeout(timeout)
                .form(&[
                    ("creation_id", creation_id),
                    ("access_token", access_token),
                ])
        })
        .await
    }

    fn container_from(body: serde_json::Value) -> Result<CreatedContainer, GraphError> {
        let parsed: CreateBody = serde_json::from_value(body.clone())
            .map_err(|e| GraphError::InvalidResponse(e.to_string()))?;
        match parsed.id {
            Some(id) if !id.is_empty() => Ok(CreatedContainer { id, body }),
            _ => Err(GraphError::MissingCreationId { body }),
        }
    }

    /// Send a request, retrying transient failures with backoff.
    async fn execute<T: DeserializeOwned>(
        &self,
        op: &str,
        make: impl Fn() -> RequestBuilder,
    ) -> Result<T, GraphError> {
        let mut attempt = 0u32;
        loop {
            let result = match make().send().await {
                Ok(response) => self.handle_response(response).await,
                Err(e) => Err(GraphError::Network(e)),
            };

            match result {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < TRANSIENT_RETRIES => {
                    let backoff_ms = 500u64 * (1 << attempt); // 500ms, 1s, 2s
                    warn!(op, attempt = attempt + 1, backoff_ms, error = %e, "transient graph error, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Funnel every response through one status/shape check.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GraphError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(GraphError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::json!({ "text": text }));
            return Err(GraphError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
