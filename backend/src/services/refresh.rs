//! Refresh-token rotation with reuse and pairing checks.
//!
//! A refresh token is single use. Presenting one that is unknown, revoked or
//! expired, or one that was not issued alongside the presented access token,
//! is treated as theft: every live refresh token of the subject is revoked.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgTransaction, PgPool};

use crate::{
    config::Config,
    error::AppError,
    models::{account::Role, auth::TokenPairResponse, refresh_token::StoredRefreshToken},
    repositories::{
        refresh_token as refresh_repo,
        transaction::{begin_transaction, commit_transaction},
    },
    services::{identity, token},
    utils::{
        client::ClientMeta,
        jwt::{self, Claims},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anomaly {
    UnknownToken,
    RevokedOrExpired,
    PairMismatch,
    ConcurrentReuse,
    AccountGone,
}

impl Anomaly {
    fn as_str(self) -> &'static str {
        match self {
            Anomaly::UnknownToken => "unknown_refresh_token",
            Anomaly::RevokedOrExpired => "revoked_or_expired_refresh_token",
            Anomaly::PairMismatch => "token_pair_mismatch",
            Anomaly::ConcurrentReuse => "concurrent_refresh_reuse",
            Anomaly::AccountGone => "account_no_longer_active",
        }
    }

    fn into_error(self) -> AppError {
        match self {
            Anomaly::PairMismatch => AppError::TokenPairMismatch,
            _ => AppError::InvalidOrExpiredRefreshToken,
        }
    }
}

/// Accepts the presented row only when it is live and paired with the
/// access token it was issued alongside.
fn check_presented(
    stored: Option<StoredRefreshToken>,
    claims: &Claims,
    now: DateTime<Utc>,
) -> Result<StoredRefreshToken, Anomaly> {
    let Some(row) = stored else {
        return Err(Anomaly::UnknownToken);
    };
    if !row.is_live(now) {
        return Err(Anomaly::RevokedOrExpired);
    }
    if row.jwt_id != claims.jti || row.role != claims.role {
        return Err(Anomaly::PairMismatch);
    }
    Ok(row)
}

/// Revokes every live token of the subject, commits, and fails the call.
async fn reject<T>(
    mut tx: PgTransaction<'_>,
    subject_id: &str,
    anomaly: Anomaly,
    client: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<T, AppError> {
    let revoked = refresh_repo::revoke_all_for_subject(&mut *tx, subject_id, now).await?;
    commit_transaction(tx).await?;
    tracing::warn!(
        subject_id = %subject_id,
        reason = anomaly.as_str(),
        revoked,
        client_ip = client.ip.as_deref().unwrap_or("-"),
        user_agent = client.user_agent.as_deref().unwrap_or("-"),
        "Refresh token anomaly; revoked all sessions of subject"
    );
    Err(anomaly.into_error())
}

/// Exchanges a refresh token (plus the access token it was issued with)
/// for a new pair.
pub async fn rotate(
    pool: &PgPool,
    config: &Config,
    access_token: &str,
    refresh_token: &str,
    client: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<TokenPairResponse, AppError> {
    let claims = jwt::decode_access_token_ignoring_expiry(access_token, config).map_err(|err| {
        tracing::info!(error = %err, "Refresh presented an undecodable access token");
        AppError::InvalidToken
    })?;
    if !claims.role.is_person() {
        return Err(AppError::InvalidToken);
    }

    let token_hash = jwt::hash_refresh_token(refresh_token);
    let mut tx = begin_transaction(pool).await?;

    let found = refresh_repo::find_for_update(&mut tx, &token_hash, &claims.sub).await?;
    let stored = match check_presented(found, &claims, now) {
        Ok(row) => row,
        Err(anomaly) => return reject(tx, &claims.sub, anomaly, client, now).await,
    };

    if !refresh_repo::revoke_if_live(&mut *tx, stored.id, now).await? {
        return reject(tx, &claims.sub, Anomaly::ConcurrentReuse, client, now).await;
    }

    let Some(identity) = identity::resolve_subject(pool, stored.role, &stored.subject_id).await?
    else {
        return reject(tx, &claims.sub, Anomaly::AccountGone, client, now).await;
    };

    let pair = token::issue_token_pair(&mut tx, config, &identity, client, now).await?;
    commit_transaction(tx).await?;

    tracing::debug!(subject_id = %stored.subject_id, "Rotated refresh token");
    Ok(pair.into_response(now))
}

/// Revokes one refresh token. Unknown or already revoked tokens are not an error.
pub async fn revoke(pool: &PgPool, refresh_token: &str, now: DateTime<Utc>) -> Result<(), AppError> {
    let token_hash = jwt::hash_refresh_token(refresh_token);
    let revoked = refresh_repo::revoke_by_hash(pool, &token_hash, now).await?;
    tracing::debug!(revoked, "Refresh token revoke requested");
    Ok(())
}

/// Revokes every live refresh token of an authenticated person.
pub async fn logout_all(
    pool: &PgPool,
    subject_id: &str,
    role: Role,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    if !role.is_person() {
        return Err(AppError::Unauthorized(
            "Kiosk sessions have no refresh tokens".to_string(),
        ));
    }
    let revoked = refresh_repo::revoke_all_for_subject(pool, subject_id, now).await?;
    tracing::info!(subject_id = %subject_id, revoked, "Logged out of all sessions");
    Ok(revoked)
}
