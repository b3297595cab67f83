//! Dual-role resolution after a successful code verification.
//!
//! A phone that maps to a single role (or to two roles with a saved
//! preference) is authenticated straight away. Otherwise a short-lived
//! verified-phone marker is written and the caller must pick a role; the
//! marker is what lets `select_role` trust the earlier verification.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    models::{
        account::{Identity, Role},
        auth::{AuthenticatedResponse, VerifyCodeResponse},
        phone::PhoneNumber,
    },
    repositories::{
        role_preference as preference_repo,
        transaction::{begin_transaction, commit_transaction},
        verified_phone as marker_repo,
    },
    services::{
        identity::{self, PhoneIdentities},
        otp, token,
    },
    types::VerifiedPhoneMarkerId,
    utils::client::ClientMeta,
};

#[derive(Debug, Clone)]
pub enum Resolution {
    Authenticate(Identity),
    AwaitSelection(Vec<Identity>),
}

/// `None` when the phone no longer belongs to anyone.
pub fn resolve_roles(identities: &PhoneIdentities, preference: Option<Role>) -> Option<Resolution> {
    if identities.is_empty() {
        return None;
    }
    if let Some(single) = identities.single() {
        return Some(Resolution::Authenticate(single));
    }
    if let Some(identity) = preference.and_then(|role| identities.identity_for(role)) {
        return Some(Resolution::Authenticate(identity));
    }
    Some(Resolution::AwaitSelection(identities.identities()))
}

/// Verifies the code, then authenticates or asks for a role.
pub async fn complete_verification(
    pool: &PgPool,
    config: &Config,
    phone: &PhoneNumber,
    code: &str,
    client: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<VerifyCodeResponse, AppError> {
    otp::verify_code(pool, config, phone, code, now).await?;

    let identities = identity::resolve_phone(pool, phone).await?;
    let preference = if identities.is_dual_role() {
        preference_repo::find_preference(pool, phone.as_str())
            .await?
            .map(|saved| saved.preferred_role)
    } else {
        None
    };

    match resolve_roles(&identities, preference) {
        None => {
            tracing::info!(phone = %phone.masked(), "Account removed between send and verify");
            Err(AppError::UserNotFound)
        }
        Some(Resolution::Authenticate(identity)) => {
            let AuthenticatedResponse { tokens, profile } =
                token::authenticate(pool, config, &identity, client, now).await?;
            Ok(VerifyCodeResponse::Authenticated { tokens, profile })
        }
        Some(Resolution::AwaitSelection(candidates)) => {
            let ttl = config.role_selection_ttl();
            marker_repo::insert_marker(
                pool,
                VerifiedPhoneMarkerId::new(),
                phone.as_str(),
                now,
                now + ttl,
            )
            .await?;
            tracing::info!(phone = %phone.masked(), "Awaiting role selection");

            Ok(VerifyCodeResponse::AwaitingRoleSelection {
                available_roles: candidates.iter().map(Identity::role).collect(),
                profiles: candidates.iter().map(Identity::profile).collect(),
                selection_expires_in: u64::try_from(ttl.num_seconds()).unwrap_or_default(),
            })
        }
    }
}

/// Authenticates a dual-role phone as the chosen role and remembers the choice.
///
/// The role is checked against the registries before the marker is consumed,
/// so a mistyped role does not cost the caller its verification.
pub async fn select_role(
    pool: &PgPool,
    config: &Config,
    phone: &PhoneNumber,
    role: Role,
    client: &ClientMeta,
    now: DateTime<Utc>,
) -> Result<AuthenticatedResponse, AppError> {
    if !role.is_person() {
        return Err(AppError::InvalidRoleSelection);
    }

    let identities = identity::resolve_phone(pool, phone).await?;
    let Some(identity) = identities.identity_for(role) else {
        tracing::info!(phone = %phone.masked(), %role, "Role selection for a role the phone lacks");
        return Err(AppError::InvalidRoleSelection);
    };

    let mut tx = begin_transaction(pool).await?;
    if marker_repo::consume_marker(&mut *tx, phone.as_str(), now)
        .await?
        .is_none()
    {
        tracing::info!(phone = %phone.masked(), "Role selection without a live verification");
        return Err(AppError::InvalidRoleSelection);
    }
    preference_repo::save_preference(&mut *tx, phone.as_str(), role, now).await?;
    let pair = token::issue_token_pair(&mut tx, config, &identity, client, now).await?;
    identity::record_login(&mut *tx, &identity, now).await?;
    commit_transaction(tx).await?;

    tracing::info!(phone = %phone.masked(), %role, "Role selected");
    Ok(AuthenticatedResponse {
        tokens: pair.into_response(now),
        profile: identity.profile(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::fixtures::{guardian, staff};

    fn dual() -> PhoneIdentities {
        PhoneIdentities {
            guardian: Some(guardian("09012345678")),
            staff: Some(staff("09012345678")),
        }
    }

    #[test]
    fn guardian_only_phone_authenticates_without_prompt() {
        let identities = PhoneIdentities {
            guardian: Some(guardian("09012345678")),
            staff: None,
        };
        match resolve_roles(&identities, Some(Role::Staff)) {
            Some(Resolution::Authenticate(identity)) => assert_eq!(identity.role(), Role::Guardian),
            other => panic!("expected authentication, got {other:?}"),
        }
    }

    #[test]
    fn dual_role_without_preference_offers_both_roles() {
        match resolve_roles(&dual(), None) {
            Some(Resolution::AwaitSelection(candidates)) => {
                let roles: Vec<_> = candidates.iter().map(Identity::role).collect();
                assert_eq!(roles, vec![Role::Guardian, Role::Staff]);
            }
            other => panic!("expected selection, got {other:?}"),
        }
    }

    #[test]
    fn saved_preference_short_circuits() {
        match resolve_roles(&dual(), Some(Role::Staff)) {
            Some(Resolution::Authenticate(identity)) => assert_eq!(identity.role(), Role::Staff),
            other => panic!("expected authentication, got {other:?}"),
        }
    }

    #[test]
    fn kiosk_preference_is_ignored() {
        assert!(matches!(
            resolve_roles(&dual(), Some(Role::Kiosk)),
            Some(Resolution::AwaitSelection(_))
        ));
    }

    #[test]
    fn unknown_phone_resolves_to_nothing() {
        assert!(resolve_roles(&PhoneIdentities::default(), None).is_none());
    }
}
