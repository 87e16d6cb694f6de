//! Account records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform account posts are scheduled for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// Human-readable handle on the platform.
    pub handle: String,
    /// Platform-side user id used in publish API paths.
    pub platform_user_id: String,
    /// IANA timezone name for local-day window math.
    pub timezone: String,
    /// Pause switch. A paused account's posts cannot be claimed, and its
    /// remaining `scheduled` posts are force-failed.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Credential loaded for a publish attempt. Only returned for active
/// accounts.
#[derive(Debug, Clone)]
pub struct Credential {
    pub platform_user_id: String,
    pub access_token: String,
}

impl Credential {
    /// True when the token is present and non-empty.
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty()
    }
}
