//! Request gate
//!
//! Every inbound request is evaluated before any handler runs. The gate
//! checks, in order and stopping at the first hit:
//!
//! 1. the user agent against scanner signatures (403 `forbidden-agent`)
//! 2. the query string against injection/traversal indicators
//!    (400 `suspicious-query`)
//! 3. the `Content-Type` of POST, PUT and PATCH requests against an allow
//!    list (415 `unsupported-media-type`)
//!
//! Requests that pass are forwarded with a [`ForwardPlan`]: the security
//! header set, a fresh nonce, the rate limit advertisement and, for API
//! paths, no-cache directives. The gate holds no mutable state.

pub mod headers;
pub mod middleware;
pub mod rules;

pub use headers::{generate_nonce, is_api_path, security_headers, API_PREFIX, NONCE_HEADER};
pub use middleware::{gate_middleware, CspNonce};
pub use rules::{GateRule, RejectReason, RuleSet, RuleTarget};

use crate::error::Result;
use std::borrow::Cow;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode};
use tracing::debug;

/// The parts of a request the gate inspects
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    /// Query string without the leading `?`
    pub query: &'a str,
    pub headers: &'a HeaderMap,
}

impl<'a> GateRequest<'a> {
    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        Self {
            method: request.method(),
            path: request.uri().path(),
            query: request.uri().query().unwrap_or(""),
            headers: request.headers(),
        }
    }

    /// Header value with non-UTF-8 bytes replaced, so opaque bytes cannot hide a match
    fn header(&self, name: HeaderName) -> Option<Cow<'a, str>> {
        self.headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
    }

    pub fn user_agent(&self) -> Cow<'a, str> {
        self.header(header::USER_AGENT).unwrap_or(Cow::Borrowed(""))
    }

    pub fn content_type(&self) -> Option<Cow<'a, str>> {
        self.header(header::CONTENT_TYPE)
    }
}

/// A terminal rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub reason: RejectReason,
}

impl From<RejectReason> for Rejection {
    fn from(reason: RejectReason) -> Self {
        Self {
            status: reason.status(),
            reason,
        }
    }
}

/// Headers attached to a forwarded request's response
#[derive(Debug, Clone)]
pub struct ForwardPlan {
    pub headers: HeaderMap,
    pub nonce: String,
}

impl ForwardPlan {
    /// Merge the plan into a response's headers.
    ///
    /// Rate limit values set by an endpoint limiter win over the static
    /// advertisement; every other plan header overrides the response.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            let advertised = headers::RATE_LIMIT_ADVERTISEMENT
                .iter()
                .any(|(key, _)| name == key);
            if advertised && target.contains_key(name) {
                continue;
            }
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Outcome of evaluating one request
#[derive(Debug, Clone)]
pub enum GateDecision {
    Reject(Rejection),
    Forward(ForwardPlan),
}

impl GateDecision {
    pub fn is_forward(&self) -> bool {
        matches!(self, GateDecision::Forward(_))
    }
}

/// Stateless request filter
#[derive(Debug)]
pub struct RequestGate {
    rules: RuleSet,
}

impl RequestGate {
    /// Build the gate from the built-in rule tables
    pub fn new() -> Result<Self> {
        Ok(Self::with_rules(RuleSet::builtin()?))
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Decide whether a request may reach its handler
    pub fn evaluate(&self, request: &GateRequest<'_>) -> GateDecision {
        if let Some(rule) = self.rules.match_user_agent(&request.user_agent()) {
            debug!(pattern = rule.pattern, "User agent matched scanner signature");
            return GateDecision::Reject(rule.reason.into());
        }

        if let Some(rule) = self.rules.match_query(request.query) {
            debug!(pattern = rule.pattern, "Query matched injection indicator");
            return GateDecision::Reject(rule.reason.into());
        }

        let content_type = request.content_type();
        if is_mutating(request.method) && !self.rules.content_type_allowed(content_type.as_deref())
        {
            debug!(
                method = %request.method,
                content_type = ?content_type,
                "Content type not allowed"
            );
            return GateDecision::Reject(RejectReason::UnsupportedMediaType.into());
        }

        GateDecision::Forward(self.forward_plan(request.path))
    }

    fn forward_plan(&self, path: &str) -> ForwardPlan {
        let mut headers = security_headers();
        headers::insert_static(&mut headers, &headers::RATE_LIMIT_ADVERTISEMENT);

        if is_api_path(path) {
            headers::insert_static(&mut headers, &headers::NO_CACHE_HEADERS);
        }

        let nonce = generate_nonce();
        if let Ok(value) = HeaderValue::from_str(&nonce) {
            headers.insert(NONCE_HEADER, value);
        }

        ForwardPlan { headers, nonce }
    }
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn gate() -> RequestGate {
        RequestGate::new().unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(name, value) in pairs {
            map.insert(name, HeaderValue::from_static(value));
        }
        map
    }

    fn evaluate(method: Method, path: &str, query: &str, headers: &HeaderMap) -> GateDecision {
        gate().evaluate(&GateRequest {
            method: &method,
            path,
            query,
            headers,
        })
    }

    fn rejection(decision: GateDecision) -> Rejection {
        match decision {
            GateDecision::Reject(rejection) => rejection,
            GateDecision::Forward(_) => panic!("expected rejection"),
        }
    }

    fn plan(decision: GateDecision) -> ForwardPlan {
        match decision {
            GateDecision::Forward(plan) => plan,
            GateDecision::Reject(rejection) => panic!("unexpected rejection: {:?}", rejection),
        }
    }

    #[test]
    fn test_scanner_user_agent_rejected_regardless_of_path() {
        let h = headers(&[("user-agent", "sqlmap/1.0")]);

        for (path, query) in [("/", ""), ("/api/ai-chat", "page=1"), ("/garden/notes", "")] {
            let rejection = rejection(evaluate(Method::GET, path, query, &h));
            assert_eq!(rejection.status, StatusCode::FORBIDDEN);
            assert_eq!(rejection.reason, RejectReason::ForbiddenAgent);
        }
    }

    #[test]
    fn test_scanner_user_agent_with_non_utf8_bytes_rejected() {
        let mut h = HeaderMap::new();
        h.insert(
            "user-agent",
            HeaderValue::from_bytes(b"sqlmap/1.0 \xe9").unwrap(),
        );

        let rejection = rejection(evaluate(Method::GET, "/", "", &h));
        assert_eq!(rejection.reason, RejectReason::ForbiddenAgent);

        // Opaque bytes alone are not a signature
        let mut h = HeaderMap::new();
        h.insert(
            "user-agent",
            HeaderValue::from_bytes(b"Mozilla/5.0 \xe9").unwrap(),
        );
        assert!(evaluate(Method::GET, "/", "", &h).is_forward());
    }

    #[test]
    fn test_sql_injection_query_rejected() {
        let h = headers(&[("user-agent", "Mozilla/5.0")]);
        let rejection = rejection(evaluate(Method::GET, "/", "id=1; DROP TABLE users", &h));
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejection.reason, RejectReason::SuspiciousQuery);
    }

    #[test]
    fn test_post_content_type_filtering() {
        let html = headers(&[("user-agent", "Mozilla/5.0"), ("content-type", "text/html")]);
        let rejection = rejection(evaluate(Method::POST, "/api/ai-chat", "", &html));
        assert_eq!(rejection.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(rejection.reason, RejectReason::UnsupportedMediaType);

        let json = headers(&[
            ("user-agent", "Mozilla/5.0"),
            ("content-type", "application/json"),
        ]);
        assert!(evaluate(Method::POST, "/api/ai-chat", "", &json).is_forward());
    }

    #[test]
    fn test_mutating_request_without_content_type_rejected() {
        let h = headers(&[("user-agent", "Mozilla/5.0")]);
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            let rejection = rejection(evaluate(method, "/api/svg-optimize", "", &h));
            assert_eq!(rejection.reason, RejectReason::UnsupportedMediaType);
        }

        // Content type is not inspected for other methods
        assert!(evaluate(Method::GET, "/", "", &h).is_forward());
        assert!(evaluate(Method::DELETE, "/api/x", "", &h).is_forward());
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        // Scanner + bad query + bad content type: user agent wins
        let h = headers(&[("user-agent", "Nikto"), ("content-type", "text/html")]);
        let first = rejection(evaluate(Method::POST, "/", "q=<script>", &h));
        assert_eq!(first.reason, RejectReason::ForbiddenAgent);

        // Bad query + bad content type: query wins
        let h = headers(&[("user-agent", "Mozilla/5.0"), ("content-type", "text/html")]);
        let second = rejection(evaluate(Method::POST, "/", "q=<script>", &h));
        assert_eq!(second.reason, RejectReason::SuspiciousQuery);
    }

    #[test]
    fn test_forward_api_path_headers() {
        let h = headers(&[("user-agent", "Mozilla/5.0")]);
        let plan = plan(evaluate(Method::GET, "/api/ai-chat", "", &h));

        assert_eq!(plan.headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(plan.headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(plan.headers.get("Pragma").unwrap(), "no-cache");
        assert_eq!(plan.headers.get("Expires").unwrap(), "0");
        assert!(plan
            .headers
            .get("Cache-Control")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("no-store"));
        assert_eq!(plan.headers.get("X-RateLimit-Limit").unwrap(), "100");

        let decoded = STANDARD.decode(&plan.nonce).unwrap();
        assert_eq!(decoded.len(), 16);
        assert_eq!(plan.headers.get(NONCE_HEADER).unwrap(), plan.nonce.as_str());
    }

    #[test]
    fn test_forward_page_path_has_no_cache_override() {
        let plan = plan(evaluate(Method::GET, "/blog", "", &HeaderMap::new()));

        assert_eq!(plan.headers.get("Referrer-Policy").unwrap(), "strict-origin-when-cross-origin");
        assert!(plan.headers.get("Cache-Control").is_none());
        assert!(plan.headers.get("Pragma").is_none());
    }

    #[test]
    fn test_apply_keeps_endpoint_rate_limit_values() {
        let plan = plan(evaluate(Method::GET, "/api/placeholder", "", &HeaderMap::new()));

        let mut response = headers(&[
            ("x-ratelimit-limit", "60"),
            ("x-frame-options", "SAMEORIGIN"),
        ]);
        plan.apply(&mut response);

        assert_eq!(response.get("x-ratelimit-limit").unwrap(), "60");
        assert_eq!(response.get("x-ratelimit-window").unwrap(), "60");
        assert_eq!(response.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(response.get(NONCE_HEADER).unwrap(), plan.nonce.as_str());
    }

    #[test]
    fn test_each_forward_gets_fresh_nonce() {
        let first = plan(evaluate(Method::GET, "/", "", &HeaderMap::new()));
        let second = plan(evaluate(Method::GET, "/", "", &HeaderMap::new()));
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn test_gate_request_from_http_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/placeholder?width=10")
            .header("user-agent", "Mozilla/5.0")
            .header("content-type", "application/json")
            .body(())
            .unwrap();

        let gate_request = GateRequest::from_request(&request);
        assert_eq!(gate_request.method, Method::POST);
        assert_eq!(gate_request.path, "/api/placeholder");
        assert_eq!(gate_request.query, "width=10");
        assert_eq!(gate_request.user_agent(), "Mozilla/5.0");
        assert_eq!(gate_request.content_type().as_deref(), Some("application/json"));
    }
}
