//! Kiosk credentials and lock state stored on the `nurseries` row.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::{
    models::kiosk::{KioskAccount, KioskFailureState},
    types::NurseryId,
};

const KIOSK_COLUMNS: &str = "id AS nursery_id, name AS nursery_name, \
     kiosk_login_id AS login_id, kiosk_password_hash AS password_hash, \
     kiosk_login_attempts AS login_attempts, kiosk_is_locked AS is_locked, \
     kiosk_locked_until AS locked_until, kiosk_last_login_at AS last_login_at";

/// Reads and row-locks the kiosk account so password checks against one
/// nursery run one at a time until the holding transaction ends.
pub async fn lock_by_login_id(
    conn: &mut PgConnection,
    login_id: &str,
) -> Result<Option<KioskAccount>, sqlx::Error> {
    let query =
        format!("SELECT {KIOSK_COLUMNS} FROM nurseries WHERE kiosk_login_id = $1 FOR UPDATE");
    sqlx::query_as::<_, KioskAccount>(&query)
        .bind(login_id)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_nursery_id(
    pool: &PgPool,
    nursery_id: NurseryId,
) -> Result<Option<KioskAccount>, sqlx::Error> {
    let query = format!(
        "SELECT {KIOSK_COLUMNS} FROM nurseries WHERE id = $1 AND kiosk_login_id IS NOT NULL"
    );
    sqlx::query_as::<_, KioskAccount>(&query)
        .bind(nursery_id)
        .fetch_optional(pool)
        .await
}

/// Lifts a lock whose period has elapsed and zeroes the counter.
pub async fn clear_expired_lock(
    executor: impl PgExecutor<'_>,
    nursery_id: NurseryId,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE nurseries SET kiosk_is_locked = FALSE, kiosk_locked_until = NULL, \
            kiosk_login_attempts = 0 \
         WHERE id = $1 AND kiosk_is_locked AND kiosk_locked_until <= $2",
    )
    .bind(nursery_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Counts a failed attempt and locks once `max_attempts` is reached, in one
/// statement so concurrent failures cannot lose increments. A row under an
/// active lock is left untouched and yields `None`.
pub async fn record_failure(
    executor: impl PgExecutor<'_>,
    nursery_id: NurseryId,
    max_attempts: i32,
    now: DateTime<Utc>,
    locked_until: DateTime<Utc>,
) -> Result<Option<KioskFailureState>, sqlx::Error> {
    sqlx::query_as::<_, KioskFailureState>(
        "UPDATE nurseries SET \
            kiosk_login_attempts = kiosk_login_attempts + 1, \
            kiosk_is_locked = (kiosk_login_attempts + 1 >= $2), \
            kiosk_locked_until = CASE WHEN kiosk_login_attempts + 1 >= $2 THEN $4 ELSE NULL END \
         WHERE id = $1 AND NOT (kiosk_is_locked AND COALESCE(kiosk_locked_until > $3, FALSE)) \
         RETURNING kiosk_login_attempts AS login_attempts, kiosk_is_locked AS is_locked, \
            kiosk_locked_until AS locked_until",
    )
    .bind(nursery_id)
    .bind(max_attempts)
    .bind(now)
    .bind(locked_until)
    .fetch_optional(executor)
    .await
}

/// Resets the counter and stamps the login; `false` when the row is under an
/// active lock.
pub async fn record_success(
    executor: impl PgExecutor<'_>,
    nursery_id: NurseryId,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE nurseries SET kiosk_login_attempts = 0, kiosk_is_locked = FALSE, \
            kiosk_locked_until = NULL, kiosk_last_login_at = $2 \
         WHERE id = $1 AND NOT (kiosk_is_locked AND COALESCE(kiosk_locked_until > $2, FALSE))",
    )
    .bind(nursery_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Stores new kiosk credentials for a nursery and clears any lock.
pub async fn set_credentials(
    pool: &PgPool,
    nursery_id: NurseryId,
    login_id: &str,
    password_hash: &str,
) -> Result<u64, sqlx::Error> {
    sqlx::query(
        "UPDATE nurseries SET kiosk_login_id = $2, kiosk_password_hash = $3, \
            kiosk_login_attempts = 0, kiosk_is_locked = FALSE, kiosk_locked_until = NULL \
         WHERE id = $1",
    )
    .bind(nursery_id)
    .bind(login_id)
    .bind(password_hash)
    .execute(pool)
    .await
    .map(|result| result.rows_affected())
}
