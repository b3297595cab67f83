//! One-time passcode challenges.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::OtpChallengeId;

#[derive(Debug, Clone, Serialize, FromRow)]
/// One issued code for one phone. Rows are append-only; `attempt_count`
/// only grows and `is_used` only flips false → true.
pub struct OtpChallenge {
    pub id: OtpChallengeId,
    pub phone: String,
    /// Hex HMAC-SHA256 of the code; the raw code is never stored.
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempt_count: i32,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Values for a challenge about to be inserted.
#[derive(Debug)]
pub struct NewOtpChallenge<'a> {
    pub id: OtpChallengeId,
    pub phone: &'a str,
    pub code_hash: &'a str,
    pub expires_at: DateTime<Utc>,
    pub client_ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}
