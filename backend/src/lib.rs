pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{docs::ApiDoc, state::AppState};

/// Builds the full HTTP surface on top of `state`.
///
/// The credential endpoints (code send/verify, kiosk login) sit behind the
/// per-IP limiter, so the server must be run with peer address info
/// (`into_make_service_with_connect_info::<SocketAddr>()`).
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let ip_limiter = middleware::rate_limit::create_ip_rate_limiter(&state.config)?;

    let limited_routes = Router::new()
        .route("/api/auth/otp/send", post(handlers::auth::send_code))
        .route("/api/auth/otp/verify", post(handlers::auth::verify_code))
        .route("/api/kiosk/login", post(handlers::kiosk::login))
        .layer(ip_limiter);

    let public_routes = Router::new()
        .route("/api/auth/select-role", post(handlers::auth::select_role))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/auth/revoke", post(handlers::auth::revoke))
        .route("/api/kiosk/heartbeat", post(handlers::kiosk::heartbeat))
        .route("/api/health", get(handlers::health::health));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/logout-all", post(handlers::auth::logout_all))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let kiosk_routes = Router::new()
        .route("/api/kiosk/session", get(handlers::kiosk::session))
        .route_layer(axum_middleware::from_fn(middleware::require_kiosk))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let cors = cors_layer(&state.config.cors_allow_origins);

    Ok(Router::new()
        .merge(limited_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .merge(kiosk_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(std::time::Duration::from_secs(24 * 60 * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, services::sms::MockSmsSender};
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use std::{net::SocketAddr, sync::Arc};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = Config::test_default();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        app(AppState::new(pool, config, Arc::new(MockSmsSender::new()))).expect("router")
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn limited_routes_validate_before_touching_the_database() {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/auth/otp/send")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"phone":"12"}"#))
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_cors_origins_are_skipped() {
        let _ = cors_layer(&["http://localhost:8000".into(), "bad\norigin".into()]);
    }
}
