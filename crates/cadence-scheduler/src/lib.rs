//! Claimer loop and stuck-post reaper.
//!
//! A single-threaded periodic loop claims due posts into `queued` and hands
//! each to the dispatch queue exactly once per claim. On a lower sub-cadence
//! the same loop reaps posts abandoned mid-processing and warns when the
//! store's clock drifts from the process clock.

mod claimer;
mod error;

pub use claimer::Claimer;
pub use error::SchedulerError;
