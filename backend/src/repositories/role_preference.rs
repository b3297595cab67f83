use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::models::{account::Role, role_preference::RolePreference};

pub async fn find_preference(
    pool: &PgPool,
    phone: &str,
) -> Result<Option<RolePreference>, sqlx::Error> {
    sqlx::query_as::<_, RolePreference>(
        "SELECT phone, preferred_role, created_at, updated_at \
         FROM role_preferences WHERE phone = $1",
    )
    .bind(phone)
    .fetch_optional(pool)
    .await
}

/// Inserts or replaces the saved role of a phone.
pub async fn save_preference(
    executor: impl PgExecutor<'_>,
    phone: &str,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO role_preferences (phone, preferred_role, created_at, updated_at) \
         VALUES ($1, $2, $3, $3) \
         ON CONFLICT (phone) DO UPDATE SET \
            preferred_role = EXCLUDED.preferred_role, updated_at = EXCLUDED.updated_at",
    )
    .bind(phone)
    .bind(role)
    .bind(now)
    .execute(executor)
    .await
    .map(|_| ())
}
