//! Request and response payloads of the authentication endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::models::{account::ProfileSnippet, account::Role, phone::validate_phone};

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Asks for a one-time code to be texted to a registered phone.
pub struct SendCodeRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCodeResponse {
    pub message: String,
    /// Seconds until the issued code expires.
    pub expires_in: u64,
    /// Seconds until another code may be requested.
    pub resend_available_in: u64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyCodeRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(custom(function = "validate_code_format"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Explicit role choice of a dual-role phone after a successful verification.
pub struct SelectRoleRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Access/refresh pair returned on login and rotation.
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedResponse {
    pub tokens: TokenPairResponse,
    pub profile: ProfileSnippet,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
/// Outcome of a successful code verification.
pub enum VerifyCodeResponse {
    /// The phone maps to one role (or a saved preference): tokens are issued.
    Authenticated {
        tokens: TokenPairResponse,
        profile: ProfileSnippet,
    },
    /// The phone is both guardian and staff; call `select-role` next.
    AwaitingRoleSelection {
        available_roles: Vec<Role>,
        profiles: Vec<ProfileSnippet>,
        /// Seconds the verification stays valid for a role selection.
        selection_expires_in: u64,
    },
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    /// The (possibly expired) access token issued with `refresh_token`.
    #[validate(length(min = 1, message = "Access token is required"))]
    pub access_token: String,
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RevokeRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct KioskLoginRequest {
    #[validate(length(min = 1, max = 100, message = "Login id is required"))]
    pub login_id: String,
    #[validate(length(min = 1, max = 256, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Kiosk access token. Kiosk sessions are renewed by heartbeat, never by refresh token.
pub struct KioskTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub nursery_id: String,
    pub nursery_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// The kiosk session behind a verified kiosk token.
pub struct KioskSessionResponse {
    pub nursery_id: String,
    pub nursery_name: String,
    pub login_id: String,
    /// Password login that started the session.
    pub session_started_at: DateTime<Utc>,
    /// Heartbeats stop renewing after this instant.
    pub session_expires_at: DateTime<Utc>,
    pub token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Identity asserted by a verified access token.
pub struct MeResponse {
    pub subject: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub claims: BTreeMap<String, String>,
}

/// Codes are short numeric strings; length is enforced against configuration later.
pub fn validate_code_format(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() || code.len() > 10 {
        return Err(ValidationError::new("code_invalid_length"));
    }
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("code_invalid_characters"));
    }
    Ok(())
}
