//! Publish worker and post-lifecycle state machine.
//!
//! Workers consume dispatched jobs, atomically claim a `queued` post into
//! `publishing`, perform the remote publish appropriate to the post kind,
//! and resolve to `published`, a scheduled retry, or terminal `failed` --
//! with account auto-pause after repeated failures.

mod media;
mod pause;
mod publisher;
mod resolution;
mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use media::resolve_media_url;
pub use pause::maybe_auto_pause;
pub use publisher::{Publisher, PublishOutcome, WorkerOptions};
pub use resolution::{classify_graph_error, resolve_failure, FailureInfo, Resolution};
pub use worker::run_workers;
