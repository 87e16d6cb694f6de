//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Immutable tunables for the scheduling pipeline, constructed once at
/// process start and passed by reference into each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How far into the future a `scheduled` post becomes claimable.
    pub lookahead_secs: u64,
    /// Claimer loop cadence.
    pub tick_secs: u64,
    /// Posts stuck in `publishing` longer than this are reaped.
    pub reap_publishing_after_secs: u64,
    /// Posts stuck in `queued` longer than this are reaped.
    pub reap_queued_after_secs: u64,
    /// Warn when DB and process clocks diverge by more than this.
    pub drift_warn_secs: u64,
    /// Fixed delay before a retry attempt becomes claimable.
    pub retry_delay_secs: u64,
    /// Number of retries allowed before terminal failure.
    pub retry_budget: i32,
    /// Pause an account after this many consecutive failed posts.
    pub pause_after_consecutive_failures: usize,
    /// Minimum spacing between two active posts on one account.
    pub min_spacing_minutes: i64,
    /// Local posting window start hour (inclusive).
    pub day_start_hour: u8,
    /// Local posting window end hour (exclusive).
    pub day_end_hour: u8,
    /// Maximum active posts per account per local calendar day.
    pub daily_limit: usize,
    /// Maximum posts claimed per scheduler tick.
    pub claim_batch_size: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 30,
            tick_secs: 10,
            reap_publishing_after_secs: 120,
            reap_queued_after_secs: 300,
            drift_warn_secs: 2,
            retry_delay_secs: 600,
            retry_budget: 1,
            pause_after_consecutive_failures: 3,
            min_spacing_minutes: 15,
            day_start_hour: 8,
            day_end_hour: 22,
            daily_limit: 15,
            claim_batch_size: 50,
        }
    }
}

impl PipelineConfig {
    /// Window span in minutes, used as the autoshift search radius.
    pub fn window_span_minutes(&self) -> i64 {
        (i64::from(self.day_end_hour) - i64::from(self.day_start_hour)).max(0) * 60
    }
}
