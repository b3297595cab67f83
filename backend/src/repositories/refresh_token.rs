//! Persisted refresh tokens. Rows are revoked, never deleted.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor};

use crate::{
    models::refresh_token::{NewRefreshToken, StoredRefreshToken},
    types::RefreshTokenId,
};

pub async fn insert_refresh_token(
    executor: impl PgExecutor<'_>,
    token: &NewRefreshToken<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO refresh_tokens \
            (id, token_hash, jwt_id, subject_id, role, client_ip, user_agent, created_at, expires_at, is_revoked) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)",
    )
    .bind(token.id)
    .bind(token.token_hash)
    .bind(token.jwt_id)
    .bind(token.subject_id)
    .bind(token.role)
    .bind(token.client_ip)
    .bind(token.user_agent)
    .bind(token.created_at)
    .bind(token.expires_at)
    .execute(executor)
    .await
    .map(|_| ())
}

/// Loads and row-locks the token presented by `subject_id`.
pub async fn find_for_update(
    conn: &mut PgConnection,
    token_hash: &str,
    subject_id: &str,
) -> Result<Option<StoredRefreshToken>, sqlx::Error> {
    sqlx::query_as::<_, StoredRefreshToken>(
        "SELECT id, token_hash, jwt_id, subject_id, role, client_ip, user_agent, created_at, \
                expires_at, is_revoked, revoked_at \
         FROM refresh_tokens WHERE token_hash = $1 AND subject_id = $2 \
         FOR UPDATE",
    )
    .bind(token_hash)
    .bind(subject_id)
    .fetch_optional(conn)
    .await
}

/// Revokes one row unless it already is; `false` signals a concurrent consumer.
pub async fn revoke_if_live(
    executor: impl PgExecutor<'_>,
    id: RefreshTokenId,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET is_revoked = TRUE, revoked_at = $2 \
         WHERE id = $1 AND is_revoked = FALSE",
    )
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Revokes every unrevoked token of a subject and returns how many were hit.
pub async fn revoke_all_for_subject(
    executor: impl PgExecutor<'_>,
    subject_id: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    sqlx::query(
        "UPDATE refresh_tokens SET is_revoked = TRUE, revoked_at = $2 \
         WHERE subject_id = $1 AND is_revoked = FALSE",
    )
    .bind(subject_id)
    .bind(now)
    .execute(executor)
    .await
    .map(|result| result.rows_affected())
}

pub async fn revoke_by_hash(
    executor: impl PgExecutor<'_>,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    sqlx::query(
        "UPDATE refresh_tokens SET is_revoked = TRUE, revoked_at = $2 \
         WHERE token_hash = $1 AND is_revoked = FALSE",
    )
    .bind(token_hash)
    .bind(now)
    .execute(executor)
    .await
    .map(|result| result.rows_affected())
}
