//! One-time code issuance and verification.
//!
//! Limits are derived from the challenge rows themselves: the daily quota
//! counts rows created in the trailing 24 hours, the verification ceiling sums
//! `attempt_count` over rows created in the trailing verify window.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::{
    config::{clamp_i64, Config},
    error::AppError,
    models::{otp_challenge::NewOtpChallenge, phone::PhoneNumber},
    repositories::{
        otp_challenge as otp_repo,
        transaction::{begin_transaction, commit_transaction},
    },
    services::{identity, sms::SmsSender},
    types::OtpChallengeId,
    utils::{client::ClientMeta, otp_code},
};

const DAILY_WINDOW_HOURS: i64 = 24;

/// Limits applied to sending and verifying codes.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub code_length: usize,
    pub code_ttl: Duration,
    pub daily_limit: i64,
    pub daily_window: Duration,
    pub cooldown: Duration,
    pub verify_window: Duration,
    pub verify_max_attempts: i64,
    /// Development mode: no daily quota.
    pub bypass_daily_limit: bool,
}

impl OtpPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            code_length: config.otp_code_length.clamp(4, 10),
            code_ttl: seconds(config.otp_expiration_seconds),
            daily_limit: i64::from(config.otp_daily_send_limit),
            daily_window: Duration::hours(DAILY_WINDOW_HOURS),
            cooldown: seconds(config.otp_send_cooldown_seconds),
            verify_window: seconds(config.otp_verify_window_seconds),
            verify_max_attempts: i64::from(config.otp_verify_max_attempts),
            bypass_daily_limit: config.development_mode,
        }
    }
}

fn seconds(value: u64) -> Duration {
    Duration::seconds(clamp_i64(value))
}

/// Quota first, then cooldown.
pub fn check_send_allowed(
    policy: &OtpPolicy,
    sent_in_window: i64,
    latest_created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if !policy.bypass_daily_limit && sent_in_window >= policy.daily_limit {
        return Err(AppError::RateLimitExceeded);
    }

    if let Some(latest) = latest_created_at {
        let elapsed = now - latest;
        if elapsed < policy.cooldown {
            let remaining = policy.cooldown - elapsed;
            // Round up so a client waiting exactly this long is never early.
            let retry_after_seconds = (remaining.num_milliseconds() + 999) / 1000;
            return Err(AppError::CooldownActive {
                retry_after_seconds: retry_after_seconds.max(1),
            });
        }
    }

    Ok(())
}

pub fn check_verify_allowed(policy: &OtpPolicy, attempts_in_window: i64) -> Result<(), AppError> {
    if attempts_in_window >= policy.verify_max_attempts {
        return Err(AppError::VerificationRateLimitExceeded);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct SentCode {
    pub challenge_id: OtpChallengeId,
    pub expires_at: DateTime<Utc>,
    pub resend_available_at: DateTime<Utc>,
}

/// Issues a code to a registered phone and hands it to the SMS sender.
///
/// The challenge row is written before dispatch and kept when dispatch
/// fails, so a failed delivery still counts toward quota and cooldown.
pub async fn send_code(
    pool: &PgPool,
    config: &Config,
    sms: &dyn SmsSender,
    phone: &PhoneNumber,
    client: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<SentCode, AppError> {
    let policy = OtpPolicy::from_config(config);

    let identities = identity::resolve_phone(pool, phone).await?;
    if identities.is_empty() {
        tracing::info!(phone = %phone.masked(), "Code requested for unknown phone");
        return Err(AppError::UserNotFound);
    }

    let sent_in_window =
        otp_repo::count_created_since(pool, phone.as_str(), now - policy.daily_window).await?;
    let latest = otp_repo::latest_created_at(pool, phone.as_str()).await?;
    if let Err(err) = check_send_allowed(&policy, sent_in_window, latest, now) {
        tracing::info!(phone = %phone.masked(), code = err.code(), "Code send refused by policy");
        return Err(err);
    }

    let code = otp_code::generate_code(policy.code_length);
    let code_hash = otp_code::hash_code(&config.otp_hash_key, phone.as_str(), &code)?;
    let challenge = NewOtpChallenge {
        id: OtpChallengeId::new(),
        phone: phone.as_str(),
        code_hash: &code_hash,
        expires_at: now + policy.code_ttl,
        client_ip: client.ip.as_deref(),
        user_agent: client.user_agent.as_deref(),
        created_at: now,
    };
    otp_repo::insert_challenge(pool, &challenge).await?;

    if config.development_mode {
        tracing::debug!(phone = %phone.masked(), code = %code, "Development mode verification code");
    }

    if let Err(err) = sms.send_code(phone, &code).await {
        tracing::error!(
            phone = %phone.masked(),
            challenge_id = %challenge.id,
            error = %err,
            "Failed to dispatch verification code"
        );
        return Err(AppError::SendFailed);
    }

    tracing::info!(phone = %phone.masked(), challenge_id = %challenge.id, "Verification code sent");
    Ok(SentCode {
        challenge_id: challenge.id,
        expires_at: challenge.expires_at,
        resend_available_at: now + policy.cooldown,
    })
}

/// Checks a submitted code against the latest open challenge and consumes it.
///
/// The ceiling check, the attempt increment and the comparison run inside one
/// transaction holding row locks on the phone's windowed challenges, so
/// parallel requests are evaluated one at a time against the committed count.
/// Every call that reaches a challenge costs one attempt whatever the outcome.
pub async fn verify_code(
    pool: &PgPool,
    config: &Config,
    phone: &PhoneNumber,
    code: &str,
    now: DateTime<Utc>,
) -> Result<OtpChallengeId, AppError> {
    let policy = OtpPolicy::from_config(config);
    let mut tx = begin_transaction(pool).await?;

    let attempts =
        otp_repo::lock_attempts_since(&mut tx, phone.as_str(), now - policy.verify_window).await?;
    if let Err(err) = check_verify_allowed(&policy, attempts) {
        tracing::info!(phone = %phone.masked(), attempts, "Verification refused by attempt ceiling");
        return Err(err);
    }

    let Some(challenge) = otp_repo::find_latest_open(&mut *tx, phone.as_str(), now).await? else {
        return Err(AppError::InvalidOrExpiredCode);
    };

    let Some(attempt_count) = otp_repo::increment_attempt(&mut *tx, challenge.id).await? else {
        return Err(AppError::InvalidOrExpiredCode);
    };

    if !otp_code::verify_code(
        &config.otp_hash_key,
        phone.as_str(),
        code.trim(),
        &challenge.code_hash,
    ) {
        commit_transaction(tx).await?;
        tracing::info!(
            phone = %phone.masked(),
            challenge_id = %challenge.id,
            attempt_count,
            "Incorrect verification code"
        );
        return Err(AppError::InvalidCode);
    }

    if !otp_repo::mark_used(&mut *tx, challenge.id, now).await? {
        tracing::info!(challenge_id = %challenge.id, "Challenge consumed concurrently");
        return Err(AppError::InvalidOrExpiredCode);
    }
    commit_transaction(tx).await?;

    Ok(challenge.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OtpPolicy {
        OtpPolicy::from_config(&Config::test_default())
    }

    #[test]
    fn defaults_follow_configuration() {
        let policy = policy();
        assert_eq!(policy.code_length, 6);
        assert_eq!(policy.code_ttl, Duration::minutes(5));
        assert_eq!(policy.daily_limit, 3);
        assert_eq!(policy.cooldown, Duration::seconds(60));
        assert_eq!(policy.verify_max_attempts, 3);
        assert!(!policy.bypass_daily_limit);
    }

    #[test]
    fn fourth_send_in_window_is_rejected() {
        let now = Utc::now();
        let long_ago = Some(now - Duration::hours(2));
        assert!(check_send_allowed(&policy(), 2, long_ago, now).is_ok());
        assert!(matches!(
            check_send_allowed(&policy(), 3, long_ago, now),
            Err(AppError::RateLimitExceeded)
        ));
    }

    #[test]
    fn development_mode_skips_quota_but_not_cooldown() {
        let mut policy = policy();
        policy.bypass_daily_limit = true;
        let now = Utc::now();
        assert!(check_send_allowed(&policy, 50, Some(now - Duration::minutes(5)), now).is_ok());
        assert!(matches!(
            check_send_allowed(&policy, 50, Some(now - Duration::seconds(5)), now),
            Err(AppError::CooldownActive { .. })
        ));
    }

    #[test]
    fn cooldown_reports_remaining_seconds_rounded_up() {
        let now = Utc::now();
        let latest = now - Duration::milliseconds(20_500);
        match check_send_allowed(&policy(), 1, Some(latest), now) {
            Err(AppError::CooldownActive {
                retry_after_seconds,
            }) => assert_eq!(retry_after_seconds, 40),
            other => panic!("expected cooldown, got {other:?}"),
        }
        assert!(check_send_allowed(&policy(), 1, Some(now - Duration::seconds(60)), now).is_ok());
    }

    #[test]
    fn quota_is_checked_before_cooldown() {
        let now = Utc::now();
        assert!(matches!(
            check_send_allowed(&policy(), 3, Some(now), now),
            Err(AppError::RateLimitExceeded)
        ));
    }

    #[test]
    fn verify_ceiling_applies_at_three_attempts() {
        assert!(check_verify_allowed(&policy(), 0).is_ok());
        assert!(check_verify_allowed(&policy(), 2).is_ok());
        assert!(matches!(
            check_verify_allowed(&policy(), 3),
            Err(AppError::VerificationRateLimitExceeded)
        ));
    }
}
