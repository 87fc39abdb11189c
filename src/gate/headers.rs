use axum::http::{HeaderMap, HeaderName, HeaderValue};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

/// Paths under this prefix are API endpoints
pub const API_PREFIX: &str = "/api/";

pub const NONCE_HEADER: &str = "x-nonce";

/// Decoded nonce length in bytes
pub const NONCE_BYTES: usize = 16;

/// Headers present on every gated response
pub const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

/// Caching directives forced on API responses
pub const NO_CACHE_HEADERS: [(&str, &str); 3] = [
    (
        "cache-control",
        "no-store, no-cache, must-revalidate, proxy-revalidate",
    ),
    ("pragma", "no-cache"),
    ("expires", "0"),
];

/// Static, informational rate limit advertisement
pub const RATE_LIMIT_ADVERTISEMENT: [(&str, &str); 2] =
    [("x-ratelimit-limit", "100"), ("x-ratelimit-window", "60")];

/// Whether a path is served by the API
pub fn is_api_path(path: &str) -> bool {
    path.starts_with(API_PREFIX) || path == API_PREFIX.trim_end_matches('/')
}

/// Fresh base64 nonce from the OS-seeded thread RNG
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Base security header set
pub fn security_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_static(&mut headers, &SECURITY_HEADERS);
    headers
}

/// Insert a static header table, overriding existing values
pub fn insert_static(headers: &mut HeaderMap, table: &[(&'static str, &'static str)]) {
    for &(name, value) in table {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

/// Copy every header from `source` into `target`, overriding existing values
pub fn merge_headers(target: &mut HeaderMap, source: &HeaderMap) {
    for (name, value) in source {
        target.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_is_base64_of_fixed_length() {
        let nonce = generate_nonce();
        let decoded = STANDARD.decode(&nonce).unwrap();
        assert_eq!(decoded.len(), NONCE_BYTES);
        assert_eq!(nonce.len(), 24);
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn test_security_headers() {
        let headers = security_headers();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(headers.get("X-XSS-Protection").unwrap(), "1; mode=block");
        assert_eq!(
            headers.get("Referrer-Policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
    }

    #[test]
    fn test_merge_overrides_existing() {
        let mut target = HeaderMap::new();
        target.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));
        target.insert("content-type", HeaderValue::from_static("text/plain"));

        merge_headers(&mut target, &security_headers());

        assert_eq!(target.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(target.get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn test_is_api_path() {
        assert!(is_api_path("/api/ai-chat"));
        assert!(is_api_path("/api"));
        assert!(!is_api_path("/apiary"));
        assert!(!is_api_path("/blog/api"));
        assert!(!is_api_path("/health"));
    }
}
