use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::auth::{bearer_token, AuthenticatedUser},
    models::auth::{KioskLoginRequest, KioskSessionResponse, KioskTokenResponse},
    services::kiosk,
    state::AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<KioskLoginRequest>,
) -> Result<Json<KioskTokenResponse>, AppError> {
    payload.validate()?;
    let response = kiosk::login(
        &state.pool,
        &state.config,
        payload.login_id.trim(),
        &payload.password,
        Utc::now(),
    )
    .await?;
    Ok(Json(response))
}

/// Renews the kiosk token in the `Authorization` header, expired or not.
pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<KioskTokenResponse>, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::InvalidToken)?;
    let response = kiosk::heartbeat(&state.pool, &state.config, token, Utc::now()).await?;
    Ok(Json(response))
}

pub async fn session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<KioskSessionResponse>, AppError> {
    Ok(Json(kiosk::session_summary(&user.claims, &state.config)?))
}
