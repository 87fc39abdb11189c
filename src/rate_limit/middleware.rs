use super::limiter::RateLimiter;
use super::types::{RateLimitResult, RETRY_AFTER_SECS};
use crate::metrics;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limiting state for one endpoint
#[derive(Clone)]
pub struct RateLimitMiddleware {
    /// Endpoint name used in logs and metrics
    name: &'static str,
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(name: &'static str, limiter: Arc<RateLimiter>) -> Self {
        Self { name, limiter }
    }
}

/// Derive the rate limit identifier for a request.
///
/// Uses the first `x-forwarded-for` hop, then `x-real-ip`, then `"unknown"`.
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get(REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Axum middleware consulting the endpoint limiter before the handler runs
pub async fn rate_limit_middleware(
    State(state): State<RateLimitMiddleware>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(request.headers());
    let result = state.limiter.check(&identifier);

    if !result.allowed {
        warn!(
            endpoint = state.name,
            identifier = %identifier,
            "Rate limit exceeded"
        );
        metrics::record_rate_limit_exceeded(state.name);
        return create_rate_limit_response(&result);
    }

    debug!(
        endpoint = state.name,
        remaining = result.remaining,
        "Rate limit check passed"
    );

    next.run(request).await
}

/// Create a 429 Too Many Requests response
pub fn create_rate_limit_response(result: &RateLimitResult) -> Response {
    let mut headers = HeaderMap::new();

    headers.insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    headers.insert("x-ratelimit-limit", HeaderValue::from(result.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));

    let body = serde_json::json!({
        "error": "Too many requests. Please try again later.",
        "status": 429,
        "retry_after": RETRY_AFTER_SECS,
    });

    (StatusCode::TOO_MANY_REQUESTS, headers, axum::Json(body)).into_response()
}
