#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::ErrorResponse,
    handlers::health::HealthResponse,
    models::{
        account::{ProfileSnippet, Role},
        auth::{
            AuthenticatedResponse, KioskLoginRequest, KioskSessionResponse, KioskTokenResponse,
            MeResponse, MessageResponse, RefreshRequest, RevokeRequest, SelectRoleRequest,
            SendCodeRequest, SendCodeResponse, TokenPairResponse, VerifyCodeRequest,
            VerifyCodeResponse,
        },
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        send_code_doc,
        verify_code_doc,
        select_role_doc,
        refresh_doc,
        revoke_doc,
        logout_all_doc,
        me_doc,
        kiosk_login_doc,
        kiosk_heartbeat_doc,
        kiosk_session_doc,
        health_doc
    ),
    components(
        schemas(
            // otp login
            SendCodeRequest,
            SendCodeResponse,
            VerifyCodeRequest,
            VerifyCodeResponse,
            SelectRoleRequest,
            AuthenticatedResponse,
            ProfileSnippet,
            Role,
            // tokens
            TokenPairResponse,
            RefreshRequest,
            RevokeRequest,
            MessageResponse,
            MeResponse,
            // kiosk
            KioskLoginRequest,
            KioskTokenResponse,
            KioskSessionResponse,
            HealthResponse,
            ErrorResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Phone verification, role selection and token lifecycle"),
        (name = "Kiosk", description = "Shared nursery devices"),
        (name = "System", description = "Operational endpoints")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/otp/send",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued and dispatched", body = SendCodeResponse),
        (status = 400, description = "Malformed phone number", body = ErrorResponse),
        (status = 404, description = "No guardian or staff uses this phone", body = ErrorResponse),
        (status = 429, description = "Daily quota reached or cooldown active", body = ErrorResponse),
        (status = 502, description = "SMS dispatch failed", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn send_code_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Authenticated, or awaiting role selection", body = VerifyCodeResponse),
        (status = 401, description = "Incorrect, used or expired code", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn verify_code_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/select-role",
    request_body = SelectRoleRequest,
    responses(
        (status = 200, description = "Authenticated as the chosen role", body = AuthenticatedResponse),
        (status = 400, description = "No recent verification or role not held", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn select_role_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPairResponse),
        (status = 401, description = "Invalid, reused or mismatched refresh token", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn refresh_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/revoke",
    request_body = RevokeRequest,
    responses((status = 200, description = "Revoked (idempotent)", body = MessageResponse)),
    tag = "Auth",
    security(())
)]
fn revoke_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout-all",
    responses(
        (status = 200, description = "Every refresh token of the caller revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "Auth"
)]
fn logout_all_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Identity asserted by the access token", body = MeResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    post,
    path = "/api/kiosk/login",
    request_body = KioskLoginRequest,
    responses(
        (status = 200, description = "Kiosk access token", body = KioskTokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 423, description = "Kiosk locked", body = ErrorResponse)
    ),
    tag = "Kiosk",
    security(())
)]
fn kiosk_login_doc() {}

#[utoipa::path(
    post,
    path = "/api/kiosk/heartbeat",
    responses(
        (status = 200, description = "Renewed kiosk access token", body = KioskTokenResponse),
        (status = 401, description = "Invalid token or session too old", body = ErrorResponse)
    ),
    tag = "Kiosk"
)]
fn kiosk_heartbeat_doc() {}

#[utoipa::path(
    get,
    path = "/api/kiosk/session",
    responses(
        (status = 200, description = "Session behind the kiosk token", body = KioskSessionResponse),
        (status = 401, description = "Missing, invalid or non-kiosk token", body = ErrorResponse)
    ),
    tag = "Kiosk"
)]
fn kiosk_session_doc() {}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service and database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "System",
    security(())
)]
fn health_doc() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/otp/send",
            "/api/auth/otp/verify",
            "/api/auth/select-role",
            "/api/auth/refresh",
            "/api/auth/revoke",
            "/api/auth/logout-all",
            "/api/auth/me",
            "/api/kiosk/login",
            "/api/kiosk/heartbeat",
            "/api/kiosk/session",
            "/api/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
