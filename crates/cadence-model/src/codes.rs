//! Well-known `error_code` values persisted on posts.
//!
//! Codes are stored as plain text so operators can filter on them directly;
//! this module keeps every producer in the workspace spelling them the same
//! way.

/// Remote publish failed with an HTTP status; formatted as `http_{status}`.
pub fn http_status(status: u16) -> String {
    format!("http_{status}")
}

/// Network-level failure talking to the platform or the queue.
pub const TRANSIENT_IO: &str = "transient_io";

/// Store unavailable or a query failed mid-publish.
pub const DB_ERROR: &str = "db_error";

/// Account missing, inactive, or without an access token.
pub const MISSING_ACCESS_TOKEN: &str = "missing_access_token";

/// Post kind has no publish implementation.
pub const UNSUPPORTED_POST_TYPE: &str = "unsupported_post_type";

/// Post kind is administratively disabled.
pub const DISABLED: &str = "disabled";

/// Remote video processing reported a failure state.
pub const VIDEO_PROCESSING_ERROR: &str = "video_processing_error";

/// Remote video processing did not finish before the deadline.
pub const VIDEO_PROCESSING_TIMEOUT: &str = "video_processing_timeout";

/// Post was returned to `scheduled` by the reaper after a stale lock.
pub const STUCK_RECOVERED: &str = "stuck_recovered";

/// Post was force-failed because its account was paused.
pub const ACCOUNT_PAUSED: &str = "account_paused";

/// Unclassified worker failure.
pub const EXCEPTION: &str = "exception";
