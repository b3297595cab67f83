//! Storage of one-time code challenges.
//!
//! Counters are derived from row scans over `(phone, created_at)`; nothing
//! here keeps a separate tally that could drift from the rows.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::{
    models::otp_challenge::{NewOtpChallenge, OtpChallenge},
    types::OtpChallengeId,
};

const CHALLENGE_COLUMNS: &str = "id, phone, code_hash, expires_at, attempt_count, is_used, \
     used_at, client_ip, user_agent, created_at";

pub async fn insert_challenge(
    executor: impl PgExecutor<'_>,
    challenge: &NewOtpChallenge<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO otp_challenges \
            (id, phone, code_hash, expires_at, attempt_count, is_used, client_ip, user_agent, created_at) \
         VALUES ($1, $2, $3, $4, 0, FALSE, $5, $6, $7)",
    )
    .bind(challenge.id)
    .bind(challenge.phone)
    .bind(challenge.code_hash)
    .bind(challenge.expires_at)
    .bind(challenge.client_ip)
    .bind(challenge.user_agent)
    .bind(challenge.created_at)
    .execute(executor)
    .await
    .map(|_| ())
}

/// Number of challenges issued to `phone` at or after `since`.
pub async fn count_created_since(
    pool: &PgPool,
    phone: &str,
    since: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM otp_challenges WHERE phone = $1 AND created_at >= $2",
    )
    .bind(phone)
    .bind(since)
    .fetch_one(pool)
    .await
}

pub async fn latest_created_at(
    pool: &PgPool,
    phone: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT created_at FROM otp_challenges WHERE phone = $1 \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(phone)
    .fetch_optional(pool)
    .await
}

/// Locks every challenge issued to `phone` at or after `since` and returns
/// the summed `attempt_count`. Concurrent verifications for the same phone
/// queue behind the lock until the holder commits.
pub async fn lock_attempts_since(
    conn: &mut PgConnection,
    phone: &str,
    since: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let counts = sqlx::query_scalar::<_, i32>(
        "SELECT attempt_count FROM otp_challenges \
         WHERE phone = $1 AND created_at >= $2 \
         FOR UPDATE",
    )
    .bind(phone)
    .bind(since)
    .fetch_all(conn)
    .await?;
    Ok(counts.into_iter().map(i64::from).sum())
}

/// Latest unused, unexpired challenge for `phone`.
pub async fn find_latest_open(
    executor: impl PgExecutor<'_>,
    phone: &str,
    now: DateTime<Utc>,
) -> Result<Option<OtpChallenge>, sqlx::Error> {
    let query = format!(
        "SELECT {CHALLENGE_COLUMNS} FROM otp_challenges \
         WHERE phone = $1 AND is_used = FALSE AND expires_at > $2 \
         ORDER BY created_at DESC LIMIT 1"
    );
    sqlx::query_as::<_, OtpChallenge>(&query)
        .bind(phone)
        .bind(now)
        .fetch_optional(executor)
        .await
}

/// Atomically counts one attempt and returns the new total.
pub async fn increment_attempt(
    executor: impl PgExecutor<'_>,
    id: OtpChallengeId,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE otp_challenges SET attempt_count = attempt_count + 1 \
         WHERE id = $1 RETURNING attempt_count",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Flips `is_used`; `false` means another request consumed the challenge first.
pub async fn mark_used(
    executor: impl PgExecutor<'_>,
    id: OtpChallengeId,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE otp_challenges SET is_used = TRUE, used_at = $2 \
         WHERE id = $1 AND is_used = FALSE",
    )
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}
