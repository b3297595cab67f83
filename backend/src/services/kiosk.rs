//! Password login for nursery kiosks, with lockout and heartbeat renewal.
//!
//! Kiosk sessions get access tokens only. The heartbeat re-issues a token
//! from an expired one as long as the session is younger than
//! `kiosk_session_max_hours`, measured from the `auth_time` claim set at
//! password login.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{
    config::Config,
    error::AppError,
    models::{
        account::Role,
        auth::{KioskSessionResponse, KioskTokenResponse},
        kiosk::{KioskAccount, KioskFailureState},
    },
    repositories::{
        kiosk as kiosk_repo,
        transaction::{begin_transaction, commit_transaction},
    },
    services::token::TOKEN_TYPE,
    types::NurseryId,
    utils::{
        jwt::{self, Claims},
        password,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Open,
    Locked { remaining_minutes: i64 },
    /// The lock period is over but the row has not been cleared yet.
    Expired,
}

pub fn lock_state(account: &KioskAccount, now: DateTime<Utc>) -> LockState {
    if !account.is_locked {
        return LockState::Open;
    }
    match account.locked_until {
        Some(until) if until > now => LockState::Locked {
            remaining_minutes: remaining_minutes(until, now),
        },
        _ => LockState::Expired,
    }
}

/// Whole minutes left, rounded up and never below one.
pub fn remaining_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}

/// Error for a wrong password given the counter state after the failure.
pub fn failure_outcome(state: &KioskFailureState, max_attempts: u32) -> AppError {
    if state.is_locked {
        return AppError::InvalidCredentials {
            remaining_attempts: None,
        };
    }
    let used = u32::try_from(state.login_attempts).unwrap_or(0);
    AppError::InvalidCredentials {
        remaining_attempts: Some(max_attempts.saturating_sub(used)),
    }
}

/// Heartbeats stop renewing once the session is older than the ceiling.
pub fn within_session_ceiling(claims: &Claims, max_age: Duration, now: DateTime<Utc>) -> bool {
    let started = claims.auth_time.unwrap_or(claims.iat);
    now.timestamp() - started <= max_age.num_seconds()
}

fn kiosk_claims(account: &KioskAccount) -> BTreeMap<String, String> {
    let mut claims = BTreeMap::new();
    claims.insert("nursery_id".to_string(), account.nursery_id.to_string());
    claims.insert("nursery_name".to_string(), account.nursery_name.clone());
    claims.insert("login_id".to_string(), account.login_id.clone());
    claims
}

fn issue_kiosk_token(
    config: &Config,
    account: &KioskAccount,
    auth_time: i64,
    now: DateTime<Utc>,
) -> Result<KioskTokenResponse, AppError> {
    let claims = Claims::new(
        account.nursery_id.to_string(),
        Role::Kiosk,
        kiosk_claims(account),
        config,
        now,
        config.kiosk_token_ttl(),
    )
    .with_auth_time(auth_time);
    let issued = jwt::sign_access_token(&claims, &config.jwt_secret)?;

    Ok(KioskTokenResponse {
        access_token: issued.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: (issued.expires_at.timestamp() - now.timestamp()).max(0),
        expires_at: issued.expires_at,
        nursery_id: account.nursery_id.to_string(),
        nursery_name: account.nursery_name.clone(),
    })
}

/// Error for an attempt that reached a row under an active lock.
fn locked_out(account: &KioskAccount, config: &Config, now: DateTime<Utc>) -> AppError {
    let remaining_minutes = match lock_state(account, now) {
        LockState::Locked { remaining_minutes } => remaining_minutes,
        _ => config.kiosk_lockout().num_minutes().max(1),
    };
    AppError::AccountLocked { remaining_minutes }
}

/// Checks a kiosk password with the nursery row locked for the whole
/// attempt, so parallel guesses are judged one after another against the
/// committed counter and never exceed the lockout threshold.
pub async fn login(
    pool: &PgPool,
    config: &Config,
    login_id: &str,
    password_input: &str,
    now: DateTime<Utc>,
) -> Result<KioskTokenResponse, AppError> {
    let mut tx = begin_transaction(pool).await?;
    let account = kiosk_repo::lock_by_login_id(&mut tx, login_id).await?;
    let Some((account, password_hash)) =
        account.and_then(|account| account.password_hash.clone().map(|hash| (account, hash)))
    else {
        password::burn_password_check(password_input);
        tracing::info!(login_id = %login_id, "Kiosk login for unknown or disabled login id");
        return Err(AppError::InvalidCredentials {
            remaining_attempts: None,
        });
    };

    match lock_state(&account, now) {
        LockState::Locked { remaining_minutes } => {
            tracing::info!(nursery_id = %account.nursery_id, remaining_minutes, "Kiosk login while locked");
            return Err(AppError::AccountLocked { remaining_minutes });
        }
        LockState::Expired => {
            kiosk_repo::clear_expired_lock(&mut *tx, account.nursery_id, now).await?;
            tracing::info!(nursery_id = %account.nursery_id, "Kiosk lock expired; counter reset");
        }
        LockState::Open => {}
    }

    if !password::verify_password(password_input, &password_hash)? {
        let max_attempts = config.kiosk_max_login_attempts.max(1);
        let Some(state) = kiosk_repo::record_failure(
            &mut *tx,
            account.nursery_id,
            i32::try_from(max_attempts).unwrap_or(i32::MAX),
            now,
            now + config.kiosk_lockout(),
        )
        .await?
        else {
            tracing::warn!(nursery_id = %account.nursery_id, "Kiosk failure hit a locked row");
            return Err(locked_out(&account, config, now));
        };
        commit_transaction(tx).await?;

        if state.is_locked {
            tracing::warn!(
                nursery_id = %account.nursery_id,
                attempts = state.login_attempts,
                "Kiosk account locked after repeated failures"
            );
        } else {
            tracing::info!(
                nursery_id = %account.nursery_id,
                attempts = state.login_attempts,
                "Kiosk login failed"
            );
        }
        return Err(failure_outcome(&state, max_attempts));
    }

    if !kiosk_repo::record_success(&mut *tx, account.nursery_id, now).await? {
        tracing::warn!(nursery_id = %account.nursery_id, "Kiosk success hit a locked row");
        return Err(locked_out(&account, config, now));
    }
    commit_transaction(tx).await?;
    tracing::info!(nursery_id = %account.nursery_id, "Kiosk logged in");
    issue_kiosk_token(config, &account, now.timestamp(), now)
}

/// Renews a kiosk token, ignoring its expiry but not the session ceiling.
pub async fn heartbeat(
    pool: &PgPool,
    config: &Config,
    token: &str,
    now: DateTime<Utc>,
) -> Result<KioskTokenResponse, AppError> {
    let claims = jwt::decode_access_token_ignoring_expiry(token, config).map_err(|err| {
        tracing::info!(error = %err, "Heartbeat presented an undecodable token");
        AppError::InvalidToken
    })?;
    if claims.role != Role::Kiosk {
        return Err(AppError::InvalidToken);
    }
    if !within_session_ceiling(&claims, config.kiosk_session_max_age(), now) {
        tracing::info!(subject = %claims.sub, "Kiosk session reached its maximum age");
        return Err(AppError::InvalidToken);
    }

    let nursery_id = claims
        .extra
        .get("nursery_id")
        .and_then(|raw| NurseryId::from_str(raw).ok())
        .ok_or(AppError::InvalidToken)?;
    let Some(account) = kiosk_repo::find_by_nursery_id(pool, nursery_id).await? else {
        return Err(AppError::InvalidToken);
    };
    if account.password_hash.is_none() {
        return Err(AppError::InvalidToken);
    }

    let auth_time = claims.auth_time.unwrap_or(claims.iat);
    issue_kiosk_token(config, &account, auth_time, now)
}

/// Describes the session carried by an already verified kiosk token.
pub fn session_summary(claims: &Claims, config: &Config) -> Result<KioskSessionResponse, AppError> {
    let claim = |name: &str| {
        claims
            .extra
            .get(name)
            .cloned()
            .ok_or(AppError::InvalidToken)
    };
    let started = claims.auth_time.unwrap_or(claims.iat);
    let session_started_at = Utc
        .timestamp_opt(started, 0)
        .single()
        .ok_or(AppError::InvalidToken)?;
    Ok(KioskSessionResponse {
        nursery_id: claim("nursery_id")?,
        nursery_name: claim("nursery_name")?,
        login_id: claim("login_id")?,
        session_started_at,
        session_expires_at: session_started_at + config.kiosk_session_max_age(),
        token_expires_at: claims.expires_at(),
    })
}
