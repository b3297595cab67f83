//! Per-IP rate limiting of the public credential endpoints.

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorError,
    GovernorLayer,
};

use crate::config::Config;

pub type IpRateLimitLayer = GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware, Body>;

/// Allows `rate_limit_ip_max_requests` per `rate_limit_ip_window_seconds`
/// per peer address, as a burst that refills evenly over the window.
pub fn create_ip_rate_limiter(config: &Config) -> anyhow::Result<IpRateLimitLayer> {
    let burst_size = config.rate_limit_ip_max_requests.max(1);
    let window = Duration::from_secs(config.rate_limit_ip_window_seconds.max(1));
    let replenish_every = (window / burst_size).max(Duration::from_millis(1));

    let governor_conf = GovernorConfigBuilder::default()
        .period(replenish_every)
        .burst_size(burst_size)
        .key_extractor(PeerIpKeyExtractor)
        .use_headers()
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid IP rate limit configuration"))?;

    Ok(GovernorLayer::new(Arc::new(governor_conf)).error_handler(rate_limit_error_handler))
}

fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::info!(wait_time, "IP rate limit exceeded");
            let mut response = json_error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "TOO_MANY_REQUESTS",
                "Too many requests. Please try again later.",
                Some(wait_time),
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Unable to determine client address.",
            None,
        ),
        GovernorError::Other { code, msg, headers } => {
            let mut response = json_error_response(
                code,
                "RATE_LIMIT_ERROR",
                &msg.unwrap_or_else(|| "Rate limit error".to_string()),
                None,
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

// Same `{error, code, details}` shape as `AppError` responses.
fn json_error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    retry_after: Option<u64>,
) -> Response<Body> {
    let mut body = serde_json::json!({
        "error": message,
        "code": code,
    });
    if let Some(retry_after) = retry_after {
        body["details"] = serde_json::json!({ "retry_after_seconds": retry_after });
    }

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(retry_after) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}
