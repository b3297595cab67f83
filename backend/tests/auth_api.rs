use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use nursery_auth::app;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower::ServiceExt;

mod support;

use support::{
    hyphenated, seed_guardian, seed_kiosk, test_pool, test_state, unique_phone, RecordingSms,
};

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let mut request = request;
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 4], 50000))));
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn post_json(uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "auth-api-test");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

#[tokio::test]
async fn guardian_logs_in_refreshes_and_logs_out_everywhere() {
    let pool = test_pool().await;
    let sms = RecordingSms::new();
    let router = app(test_state(pool.clone(), sms.clone())).expect("router");
    let phone = unique_phone();
    let guardian_id = seed_guardian(&pool, &phone, 1).await;

    let (status, body) = call(
        &router,
        post_json("/api/auth/otp/send", json!({ "phone": hyphenated(&phone) }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["expires_in"], 300);
    assert_eq!(body["resend_available_in"], 60);

    let code = sms.last_code_for(&phone).expect("code");
    let (status, body) = call(
        &router,
        post_json(
            "/api/auth/otp/verify",
            json!({ "phone": phone.as_str(), "code": code }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "authenticated");
    assert_eq!(body["profile"]["id"], guardian_id.to_string());
    let access = body["tokens"]["access_token"].as_str().expect("access").to_string();
    let refresh = body["tokens"]["refresh_token"].as_str().expect("refresh").to_string();

    let (status, body) = call(&router, get("/api/auth/me", Some(&access))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["subject"], guardian_id.to_string());
    assert_eq!(body["role"], "guardian");
    assert_eq!(body["claims"]["guardian_id"], guardian_id.to_string());

    let (status, body) = call(&router, get("/api/kiosk/session", Some(&access))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = call(
        &router,
        post_json(
            "/api/auth/refresh",
            json!({ "access_token": access, "refresh_token": refresh }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let new_access = body["access_token"].as_str().expect("access").to_string();
    let new_refresh = body["refresh_token"].as_str().expect("refresh").to_string();

    let (status, body) = call(
        &router,
        post_json("/api/auth/logout-all", json!({}), Some(&new_access)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = call(
        &router,
        post_json(
            "/api/auth/refresh",
            json!({ "access_token": new_access, "refresh_token": new_refresh }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_OR_EXPIRED_REFRESH_TOKEN");
}

#[tokio::test]
async fn policy_errors_keep_their_codes_over_http() {
    let pool = test_pool().await;
    let router = app(test_state(pool.clone(), RecordingSms::new())).expect("router");
    let phone = unique_phone();

    let (status, body) = call(
        &router,
        post_json("/api/auth/otp/send", json!({ "phone": phone.as_str() }), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "USER_NOT_FOUND");

    seed_guardian(&pool, &phone, 0).await;
    let (status, _) = call(
        &router,
        post_json("/api/auth/otp/send", json!({ "phone": phone.as_str() }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &router,
        post_json("/api/auth/otp/send", json!({ "phone": phone.as_str() }), None),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "COOLDOWN_ACTIVE");

    let (status, body) = call(
        &router,
        post_json(
            "/api/auth/select-role",
            json!({ "phone": phone.as_str(), "role": "staff" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ROLE_SELECTION");

    let (status, body) = call(
        &router,
        post_json("/api/auth/revoke", json!({ "refresh_token": "unknown" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn kiosk_login_and_heartbeat_over_http() {
    let pool = test_pool().await;
    let router = app(test_state(pool.clone(), RecordingSms::new())).expect("router");
    let (nursery_id, login_id) = seed_kiosk(&pool, "front-desk-passphrase").await;

    let (status, body) = call(
        &router,
        post_json(
            "/api/kiosk/login",
            json!({ "login_id": login_id, "password": "nope" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
    assert_eq!(body["details"]["remaining_attempts"], 4);

    let (status, body) = call(
        &router,
        post_json(
            "/api/kiosk/login",
            json!({ "login_id": login_id, "password": "front-desk-passphrase" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["nursery_id"], nursery_id.to_string());
    let token = body["access_token"].as_str().expect("token").to_string();

    let (status, body) = call(
        &router,
        post_json("/api/kiosk/heartbeat", json!({}), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "Bearer");

    let (status, body) = call(&router, get("/api/kiosk/session", Some(&token))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["nursery_id"], nursery_id.to_string());
    assert_eq!(body["login_id"], login_id);
    assert_eq!(body["nursery_name"], "Sakura Nursery");

    let (status, _) = call(&router, get("/api/kiosk/session", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&router, post_json("/api/kiosk/heartbeat", json!({}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    // Kiosk tokens carry no refresh tokens to revoke.
    let (status, _) = call(
        &router,
        post_json("/api/auth/logout-all", json!({}), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_database_status() {
    let pool = test_pool().await;
    let router = app(test_state(pool, RecordingSms::new())).expect("router");

    let (status, body) = call(&router, get("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn ip_limiter_guards_credential_endpoints() {
    let pool = test_pool().await;
    let mut state = test_state(pool, RecordingSms::new());
    state.config.rate_limit_ip_max_requests = 2;
    state.config.rate_limit_ip_window_seconds = 3600;
    let router = app(state).expect("router");

    let mut last = StatusCode::OK;
    for _ in 0..3 {
        let (status, _) = call(
            &router,
            post_json(
                "/api/kiosk/login",
                json!({ "login_id": "nobody", "password": "whatever" }),
                None,
            ),
        )
        .await;
        last = status;
    }
    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);

    // Non-credential routes are not limited.
    let (status, _) = call(&router, get("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}
