//! Guardian and staff identities as seen by the authentication core.
//!
//! Both registries own their rows; this module only reads them so the
//! token issuer can build claims and the login flow can show profile
//! snippets for dual-role phones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    FromRow, Postgres,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::types::{GuardianId, NurseryId, StaffId};

/// Role a token is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guardian,
    Staff,
    /// Shared front-desk device of a nursery; never paired with a refresh token.
    Kiosk,
}

impl Role {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guardian => "guardian",
            Role::Staff => "staff",
            Role::Kiosk => "kiosk",
        }
    }

    /// Roles a phone number can authenticate as.
    pub fn is_person(&self) -> bool {
        matches!(self, Role::Guardian | Role::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guardian" | "Guardian" | "GUARDIAN" => Ok(Role::Guardian),
            "staff" | "Staff" | "STAFF" => Ok(Role::Staff),
            "kiosk" | "Kiosk" | "KIOSK" => Ok(Role::Kiosk),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

// Stored as TEXT so the column stays readable from psql and other services.
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, Postgres> for Role {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as sqlx::Decode<Postgres>>::decode(value)?;
        Ok(raw.parse()?)
    }
}

impl sqlx::Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&str as sqlx::Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
/// Guardian row from the guardian registry.
pub struct GuardianAccount {
    pub id: GuardianId,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub child_count: i32,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
/// Staff row from the staff registry, joined with its nursery's name.
pub struct StaffAccount {
    pub staff_id: StaffId,
    pub nursery_id: NurseryId,
    pub nursery_name: String,
    pub phone: String,
    pub name: String,
    /// Registry-defined staff role (e.g. `teacher`, `director`).
    pub role: String,
    pub position: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// An authenticated person: exactly one of the capabilities a phone may hold.
#[derive(Debug, Clone)]
pub enum Identity {
    Guardian(GuardianAccount),
    Staff(StaffAccount),
}

impl Identity {
    pub fn role(&self) -> Role {
        match self {
            Identity::Guardian(_) => Role::Guardian,
            Identity::Staff(_) => Role::Staff,
        }
    }

    /// Value placed in the `sub` claim and the refresh token row.
    pub fn subject_id(&self) -> String {
        match self {
            Identity::Guardian(guardian) => guardian.id.to_string(),
            Identity::Staff(staff) => staff.staff_id.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Identity::Guardian(guardian) => &guardian.name,
            Identity::Staff(staff) => &staff.name,
        }
    }

    pub fn profile(&self) -> ProfileSnippet {
        match self {
            Identity::Guardian(guardian) => ProfileSnippet {
                role: Role::Guardian,
                id: guardian.id.to_string(),
                name: guardian.name.clone(),
                email: guardian.email.clone(),
                child_count: Some(guardian.child_count),
                nursery_id: None,
                nursery_name: None,
                staff_role: None,
                position: None,
            },
            Identity::Staff(staff) => ProfileSnippet {
                role: Role::Staff,
                id: staff.staff_id.to_string(),
                name: staff.name.clone(),
                email: None,
                child_count: None,
                nursery_id: Some(staff.nursery_id.to_string()),
                nursery_name: Some(staff.nursery_name.clone()),
                staff_role: Some(staff.role.clone()),
                position: staff.position.clone(),
            },
        }
    }
}

/// Role-specific claims carried in the access token next to the standard ones.
pub fn claims_of(identity: &Identity) -> BTreeMap<String, String> {
    let mut claims = BTreeMap::new();
    match identity {
        Identity::Guardian(guardian) => {
            claims.insert("guardian_id".to_string(), guardian.id.to_string());
            claims.insert("name".to_string(), guardian.name.clone());
            if let Some(email) = &guardian.email {
                claims.insert("email".to_string(), email.clone());
            }
        }
        Identity::Staff(staff) => {
            claims.insert("staff_id".to_string(), staff.staff_id.to_string());
            claims.insert("nursery_id".to_string(), staff.nursery_id.to_string());
            claims.insert("name".to_string(), staff.name.clone());
            claims.insert("staff_role".to_string(), staff.role.clone());
            if let Some(position) = &staff.position {
                claims.insert("position".to_string(), position.clone());
            }
        }
    }
    claims
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Lightweight profile shown after login and on the role picker.
pub struct ProfileSnippet {
    pub role: Role,
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nursery_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nursery_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}
