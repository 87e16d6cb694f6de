//! Slot placement and batch commit.
//!
//! The planner expands a recurring weekly posting plan into concrete
//! timestamps: it computes each day's local posting window in absolute time,
//! spreads candidates across it (or places them uniformly at random), detects
//! spacing conflicts against existing commitments, and relocates conflicting
//! candidates with a bounded local search ("autoshift"). The batch committer
//! orchestrates those pure pieces against persisted capacity and performs the
//! idempotent bulk insert.

mod batch;
mod direct;
mod error;
mod plan;
mod report;
mod slots;
mod window;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{
    BatchCommitter, BatchOutcome, BatchRequest, DayResult, PreflightOutcome, SkipEntry,
    SkipReason, SlotMode,
};
pub use direct::{create_post, CreateRequest};
pub use error::PlannerError;
pub use plan::{day_list, WeeklyPlan, WeeklyPlanInput};
pub use report::{LocalReportSink, ReportSink};
pub use slots::{autoshift, has_conflict, random_slots, spread, AutoshiftResult};
pub use window::{resolve_timezone, window_for, DayWindow};
