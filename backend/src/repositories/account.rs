//! Read access to the guardian and staff registries.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::{
    models::account::{GuardianAccount, StaffAccount},
    types::{GuardianId, StaffId},
};

const GUARDIAN_COLUMNS: &str = "g.id, g.phone, g.name, g.email, \
     (SELECT COUNT(*) FROM guardian_children gc WHERE gc.guardian_id = g.id)::INT4 AS child_count, \
     g.last_login_at";

const STAFF_COLUMNS: &str = "s.id AS staff_id, s.nursery_id, n.name AS nursery_name, s.phone, \
     s.name, s.role, s.position, s.last_login_at";

/// Finds the active guardian registered under a canonical phone number.
///
/// Registries may store numbers with separators, so the stored value is
/// normalized before comparing (backed by an expression index).
pub async fn find_guardian_by_phone(
    pool: &PgPool,
    phone: &str,
) -> Result<Option<GuardianAccount>, sqlx::Error> {
    let query = format!(
        "SELECT {GUARDIAN_COLUMNS} FROM guardians g \
         WHERE regexp_replace(g.phone, '[[:space:]-]', '', 'g') = $1 AND g.is_active \
         ORDER BY g.created_at ASC LIMIT 1"
    );
    sqlx::query_as::<_, GuardianAccount>(&query)
        .bind(phone)
        .fetch_optional(pool)
        .await
}

/// Finds the active staff member registered under a canonical phone number.
pub async fn find_staff_by_phone(
    pool: &PgPool,
    phone: &str,
) -> Result<Option<StaffAccount>, sqlx::Error> {
    let query = format!(
        "SELECT {STAFF_COLUMNS} FROM staff s JOIN nurseries n ON n.id = s.nursery_id \
         WHERE regexp_replace(s.phone, '[[:space:]-]', '', 'g') = $1 AND s.is_active \
         ORDER BY s.created_at ASC LIMIT 1"
    );
    sqlx::query_as::<_, StaffAccount>(&query)
        .bind(phone)
        .fetch_optional(pool)
        .await
}

pub async fn find_guardian_by_id(
    pool: &PgPool,
    id: GuardianId,
) -> Result<Option<GuardianAccount>, sqlx::Error> {
    let query = format!("SELECT {GUARDIAN_COLUMNS} FROM guardians g WHERE g.id = $1 AND g.is_active");
    sqlx::query_as::<_, GuardianAccount>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_staff_by_id(
    pool: &PgPool,
    id: StaffId,
) -> Result<Option<StaffAccount>, sqlx::Error> {
    let query = format!(
        "SELECT {STAFF_COLUMNS} FROM staff s JOIN nurseries n ON n.id = s.nursery_id \
         WHERE s.id = $1 AND s.is_active"
    );
    sqlx::query_as::<_, StaffAccount>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn touch_guardian_last_login(
    executor: impl PgExecutor<'_>,
    id: GuardianId,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE guardians SET last_login_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(executor)
        .await
        .map(|_| ())
}

pub async fn touch_staff_last_login(
    executor: impl PgExecutor<'_>,
    id: StaffId,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE staff SET last_login_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(executor)
        .await
        .map(|_| ())
}
