use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
/// Body of every error response.
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

/// Every failure that can cross the HTTP boundary.
///
/// Policy outcomes (quotas, cooldowns, lockouts) and security outcomes
/// (refresh reuse, pairing mismatch) get their own variants so callers can
/// branch on the stable `code` string; infrastructure failures collapse into
/// [`AppError::InternalServerError`] and never expose their cause.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("internal error: {0}")]
    InternalServerError(anyhow::Error),

    #[error("no account is registered for this phone number")]
    UserNotFound,
    #[error("daily verification code limit reached")]
    RateLimitExceeded,
    #[error("verification code was sent recently")]
    CooldownActive { retry_after_seconds: i64 },
    #[error("verification code could not be delivered")]
    SendFailed,
    #[error("verification code is invalid or expired")]
    InvalidOrExpiredCode,
    #[error("verification code is incorrect")]
    InvalidCode,
    #[error("too many verification attempts")]
    VerificationRateLimitExceeded,
    #[error("role selection is not allowed")]
    InvalidRoleSelection,
    #[error("refresh token is invalid or expired")]
    InvalidOrExpiredRefreshToken,
    #[error("refresh token does not belong to the access token")]
    TokenPairMismatch,
    #[error("token is invalid")]
    InvalidToken,
    #[error("kiosk account is locked")]
    AccountLocked { remaining_minutes: i64 },
    #[error("invalid login id or password")]
    InvalidCredentials { remaining_attempts: Option<u32> },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_)
            | AppError::InvalidOrExpiredCode
            | AppError::InvalidCode
            | AppError::InvalidOrExpiredRefreshToken
            | AppError::TokenPairMismatch
            | AppError::InvalidToken
            | AppError::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::Validation(_) | AppError::InvalidRoleSelection => {
                StatusCode::BAD_REQUEST
            }
            AppError::RateLimitExceeded
            | AppError::CooldownActive { .. }
            | AppError::VerificationRateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::AccountLocked { .. } => StatusCode::LOCKED,
            AppError::SendFailed => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            AppError::SendFailed => "SEND_FAILED",
            AppError::InvalidOrExpiredCode => "INVALID_OR_EXPIRED_CODE",
            AppError::InvalidCode => "INVALID_CODE",
            AppError::VerificationRateLimitExceeded => "VERIFICATION_RATE_LIMIT_EXCEEDED",
            AppError::InvalidRoleSelection => "INVALID_ROLE_SELECTION",
            AppError::InvalidOrExpiredRefreshToken => "INVALID_OR_EXPIRED_REFRESH_TOKEN",
            AppError::TokenPairMismatch => "TOKEN_PAIR_MISMATCH",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AppError::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
        }
    }

    fn retry_after_seconds(&self) -> Option<i64> {
        match self {
            AppError::CooldownActive {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            AppError::AccountLocked { remaining_minutes } => Some(remaining_minutes * 60),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let retry_after = self.retry_after_seconds();

        let (error_message, details) = match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::BadRequest(msg) => (msg, None),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                ("Internal server error".to_string(), None)
            }
            AppError::Validation(errors) => (
                "Validation failed".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
            AppError::CooldownActive {
                retry_after_seconds,
            } => (
                "Please wait before requesting another verification code".to_string(),
                Some(serde_json::json!({ "retry_after_seconds": retry_after_seconds })),
            ),
            AppError::AccountLocked { remaining_minutes } => (
                format!(
                    "Account is locked. Try again in {} minute(s)",
                    remaining_minutes
                ),
                Some(serde_json::json!({ "remaining_minutes": remaining_minutes })),
            ),
            AppError::InvalidCredentials {
                remaining_attempts: Some(remaining),
            } => (
                "Invalid login id or password".to_string(),
                Some(serde_json::json!({ "remaining_attempts": remaining })),
            ),
            other => (capitalize(&other.to_string()), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.max(1).to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::InternalServerError(err.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
