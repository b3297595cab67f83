//! Maps a canonical phone number to the guardian and staff identities it holds.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use std::str::FromStr;

use crate::{
    models::{
        account::{GuardianAccount, Identity, Role, StaffAccount},
        phone::PhoneNumber,
    },
    repositories::account as account_repo,
    types::{GuardianId, StaffId},
};

/// Every identity a phone number currently holds.
#[derive(Debug, Clone, Default)]
pub struct PhoneIdentities {
    pub guardian: Option<GuardianAccount>,
    pub staff: Option<StaffAccount>,
}

impl PhoneIdentities {
    pub fn is_empty(&self) -> bool {
        self.guardian.is_none() && self.staff.is_none()
    }

    pub fn is_dual_role(&self) -> bool {
        self.guardian.is_some() && self.staff.is_some()
    }

    /// Roles in display order: guardian first, then staff.
    pub fn available_roles(&self) -> Vec<Role> {
        let mut roles = Vec::with_capacity(2);
        if self.guardian.is_some() {
            roles.push(Role::Guardian);
        }
        if self.staff.is_some() {
            roles.push(Role::Staff);
        }
        roles
    }

    pub fn identity_for(&self, role: Role) -> Option<Identity> {
        match role {
            Role::Guardian => self.guardian.clone().map(Identity::Guardian),
            Role::Staff => self.staff.clone().map(Identity::Staff),
            Role::Kiosk => None,
        }
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.available_roles()
            .into_iter()
            .filter_map(|role| self.identity_for(role))
            .collect()
    }

    /// The identity to authenticate as when no choice is needed.
    pub fn single(&self) -> Option<Identity> {
        match (&self.guardian, &self.staff) {
            (Some(guardian), None) => Some(Identity::Guardian(guardian.clone())),
            (None, Some(staff)) => Some(Identity::Staff(staff.clone())),
            _ => None,
        }
    }
}

pub async fn resolve_phone(
    pool: &PgPool,
    phone: &PhoneNumber,
) -> Result<PhoneIdentities, sqlx::Error> {
    let guardian = account_repo::find_guardian_by_phone(pool, phone.as_str()).await?;
    let staff = account_repo::find_staff_by_phone(pool, phone.as_str()).await?;
    Ok(PhoneIdentities { guardian, staff })
}

/// Reloads the identity behind a token subject. `None` when the account is
/// gone, deactivated, or the subject is not a person.
pub async fn resolve_subject(
    pool: &PgPool,
    role: Role,
    subject_id: &str,
) -> Result<Option<Identity>, sqlx::Error> {
    match role {
        Role::Guardian => {
            let Ok(id) = GuardianId::from_str(subject_id) else {
                return Ok(None);
            };
            Ok(account_repo::find_guardian_by_id(pool, id)
                .await?
                .map(Identity::Guardian))
        }
        Role::Staff => {
            let Ok(id) = StaffId::from_str(subject_id) else {
                return Ok(None);
            };
            Ok(account_repo::find_staff_by_id(pool, id)
                .await?
                .map(Identity::Staff))
        }
        Role::Kiosk => Ok(None),
    }
}

pub async fn record_login(
    executor: impl PgExecutor<'_>,
    identity: &Identity,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    match identity {
        Identity::Guardian(guardian) => {
            account_repo::touch_guardian_last_login(executor, guardian.id, now).await
        }
        Identity::Staff(staff) => {
            account_repo::touch_staff_last_login(executor, staff.staff_id, now).await
        }
    }
}
