//! Bearer-token authentication for routes behind the core.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::account::Role,
    state::AppState,
    utils::jwt::{verify_access_token, Claims},
};

/// Identity asserted by a fully validated access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub role: Role,
    pub claims: Claims,
}

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    let claims = verify_access_token(token, &state.config).map_err(|err| {
        tracing::debug!(error = %err, "Rejected access token");
        AppError::InvalidToken
    })?;

    let user = AuthenticatedUser {
        subject: claims.sub.clone(),
        role: claims.role,
        claims,
    };
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Must run after [`auth`]; lets only kiosk tokens through.
pub async fn require_kiosk(request: Request, next: Next) -> Result<Response, AppError> {
    match request.extensions().get::<AuthenticatedUser>() {
        Some(user) if user.role == Role::Kiosk => Ok(next.run(request).await),
        Some(_) => Err(AppError::Unauthorized(
            "Kiosk token required".to_string(),
        )),
        None => Err(AppError::Unauthorized("Missing bearer token".to_string())),
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    parse_bearer_token(value)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}
