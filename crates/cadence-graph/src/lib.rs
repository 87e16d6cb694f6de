//! Graph API publish client.
//!
//! The pipeline depends on exactly three remote semantics: create a media
//! container, poll the container's processing status, and publish the
//! container. Everything else about the platform API is out of scope.

mod client;
mod error;
mod types;

pub use client::GraphClient;
pub use error::GraphError;
pub use types::{ContainerStatus, CreatedContainer};
