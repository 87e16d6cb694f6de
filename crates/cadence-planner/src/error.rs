//! Error types for the planner.

use thiserror::Error;

use cadence_store::{ConflictInfo, StoreError};

/// Errors that can occur in planning and batch commit.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Weekly plan had an unrecognized shape, key, or value.
    #[error("invalid weekly plan: {0}")]
    InvalidPlan(String),

    /// `end_date` precedes `start_date`.
    #[error("end_date must be >= start_date")]
    InvalidRange,

    /// Timezone name is not a known IANA zone.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// A post is already scheduled within the minimum spacing of the
    /// requested time.
    #[error("a post is already scheduled within {min_spacing_minutes} minutes")]
    SpacingConflict {
        conflict: ConflictInfo,
        min_spacing_minutes: i64,
    },

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Skip report could not be written.
    #[error("report error: {0}")]
    Report(String),
}
