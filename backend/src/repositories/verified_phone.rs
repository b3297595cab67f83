//! Short-lived proof that a phone passed OTP verification.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::types::VerifiedPhoneMarkerId;

pub async fn insert_marker(
    executor: impl PgExecutor<'_>,
    id: VerifiedPhoneMarkerId,
    phone: &str,
    verified_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO verified_phone_markers (id, phone, verified_at, expires_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(phone)
    .bind(verified_at)
    .bind(expires_at)
    .execute(executor)
    .await
    .map(|_| ())
}

/// Consumes the newest live marker of `phone`. Returns `None` when there is
/// nothing left to consume, including when a concurrent call won the race.
pub async fn consume_marker(
    executor: impl PgExecutor<'_>,
    phone: &str,
    now: DateTime<Utc>,
) -> Result<Option<VerifiedPhoneMarkerId>, sqlx::Error> {
    sqlx::query_scalar::<_, VerifiedPhoneMarkerId>(
        "UPDATE verified_phone_markers SET consumed_at = $2 \
         WHERE id = ( \
            SELECT id FROM verified_phone_markers \
            WHERE phone = $1 AND consumed_at IS NULL AND expires_at > $2 \
            ORDER BY verified_at DESC LIMIT 1 \
            FOR UPDATE SKIP LOCKED \
         ) AND consumed_at IS NULL \
         RETURNING id",
    )
    .bind(phone)
    .bind(now)
    .fetch_optional(executor)
    .await
}

/// Deletes markers that were consumed or expired before `cutoff`.
pub async fn prune_markers(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    sqlx::query(
        "DELETE FROM verified_phone_markers \
         WHERE (consumed_at IS NOT NULL AND consumed_at < $1) OR expires_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await
    .map(|result| result.rows_affected())
}
