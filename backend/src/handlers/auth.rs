use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::{
            AuthenticatedResponse, MeResponse, MessageResponse, RefreshRequest, RevokeRequest,
            SelectRoleRequest, SendCodeRequest, SendCodeResponse, TokenPairResponse,
            VerifyCodeRequest, VerifyCodeResponse,
        },
        phone::PhoneNumber,
    },
    services::{login, otp, refresh},
    state::AppState,
    utils::client::ClientMeta,
};

fn parse_phone(raw: &str) -> Result<PhoneNumber, AppError> {
    PhoneNumber::parse(raw).map_err(|err| AppError::Validation(vec![format!("phone: {}", err.code)]))
}

pub async fn send_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>, AppError> {
    payload.validate()?;
    let phone = parse_phone(&payload.phone)?;
    let client = ClientMeta::from_headers(&headers);
    let now = Utc::now();

    let sent = otp::send_code(
        &state.pool,
        &state.config,
        state.sms_sender.as_ref(),
        &phone,
        &client,
        now,
    )
    .await?;

    Ok(Json(SendCodeResponse {
        message: "Verification code sent".to_string(),
        expires_in: u64::try_from((sent.expires_at - now).num_seconds()).unwrap_or_default(),
        resend_available_in: u64::try_from((sent.resend_available_at - now).num_seconds())
            .unwrap_or_default(),
    }))
}

pub async fn verify_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, AppError> {
    payload.validate()?;
    let phone = parse_phone(&payload.phone)?;
    let client = ClientMeta::from_headers(&headers);

    let response = login::complete_verification(
        &state.pool,
        &state.config,
        &phone,
        &payload.code,
        &client,
        Utc::now(),
    )
    .await?;
    Ok(Json(response))
}

pub async fn select_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SelectRoleRequest>,
) -> Result<Json<AuthenticatedResponse>, AppError> {
    payload.validate()?;
    let phone = parse_phone(&payload.phone)?;
    let client = ClientMeta::from_headers(&headers);

    let response = login::select_role(
        &state.pool,
        &state.config,
        &phone,
        payload.role,
        &client,
        Utc::now(),
    )
    .await?;
    Ok(Json(response))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    payload.validate()?;
    let client = ClientMeta::from_headers(&headers);

    let tokens = refresh::rotate(
        &state.pool,
        &state.config,
        &payload.access_token,
        &payload.refresh_token,
        &client,
        Utc::now(),
    )
    .await?;
    Ok(Json(tokens))
}

pub async fn revoke(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;
    refresh::revoke(&state.pool, &payload.refresh_token, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: "Refresh token revoked".to_string(),
    }))
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>, AppError> {
    let revoked = refresh::logout_all(&state.pool, &user.subject, user.role, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: format!("Revoked {} session(s)", revoked),
    }))
}

pub async fn me(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        expires_at: user.claims.expires_at(),
        subject: user.subject,
        role: user.role,
        claims: user.claims.extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, services::sms::MockSmsSender};
    use axum::{body::Body, http::Request, http::StatusCode, routing::post, Router};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(sms: MockSmsSender) -> Router {
        let config = Config::test_default();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        Router::new()
            .route("/send", post(send_code))
            .route("/verify", post(verify_code))
            .with_state(AppState::new(pool, config, Arc::new(sms)))
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn malformed_phone_is_rejected_before_any_side_effect() {
        let mut sms = MockSmsSender::new();
        sms.expect_send_code().never();

        let (status, json) =
            post_json(app(sms), "/send", serde_json::json!({ "phone": "not a phone" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn non_numeric_code_is_rejected() {
        let (status, json) = post_json(
            app(MockSmsSender::new()),
            "/verify",
            serde_json::json!({ "phone": "090-1234-5678", "code": "12a456" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}
