//! Kiosk credentials of a nursery (tenant-level, not per user).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::NurseryId;

#[derive(Debug, Clone, FromRow)]
pub struct KioskAccount {
    pub nursery_id: NurseryId,
    pub nursery_name: String,
    pub login_id: String,
    /// Argon2 hash; `None` until an operator sets a kiosk password.
    pub password_hash: Option<String>,
    pub login_attempts: i32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Counter state after a failed attempt was recorded.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct KioskFailureState {
    pub login_attempts: i32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}
