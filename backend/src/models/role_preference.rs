use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::models::account::Role;

#[derive(Debug, Clone, FromRow)]
/// Saved guardian-or-staff choice of a dual-role phone. One row per phone.
pub struct RolePreference {
    pub phone: String,
    pub preferred_role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
