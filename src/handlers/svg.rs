use crate::error::{GatewayError, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Largest SVG accepted for optimization
pub const MAX_SVG_BYTES: usize = 1024 * 1024;

/// Ordered removal passes; each pattern is replaced with the empty string
const REMOVALS: &[&str] = &[
    r"(?s)<\?xml.*?\?>",
    r"(?is)<!DOCTYPE[^>]*>",
    r"(?s)<!--.*?-->",
    r"(?is)<metadata\b.*?</metadata\s*>",
    r"(?is)<script\b[^>]*/>",
    r"(?is)<script\b.*?</script\s*>",
    r"(?is)<(?:inkscape|sodipodi):[a-z-]+\b[^>]*/>",
    r"(?is)<(?:inkscape|sodipodi):[a-z-]+\b[^>]*>.*?</(?:inkscape|sodipodi):[a-z-]+\s*>",
    r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>"']*[^\s>"'/])"#,
    r#"(?i)\s+(?:xmlns:)?(?:inkscape|sodipodi)(?::[a-z-]+)?\s*=\s*(?:"[^"]*"|'[^']*')"#,
];

/// Regex-based SVG cleaner, compiled once at startup
#[derive(Debug)]
pub struct SvgOptimizer {
    removals: Vec<Regex>,
    between_tags: Regex,
    whitespace: Regex,
    svg_root: Regex,
}

impl SvgOptimizer {
    pub fn new() -> Result<Self> {
        let removals = REMOVALS
            .iter()
            .map(|pattern| compile(pattern))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            removals,
            between_tags: compile(r">\s+<")?,
            whitespace: compile(r"\s{2,}")?,
            svg_root: compile(r"(?i)<svg\b")?,
        })
    }

    /// Strip editor cruft, scripts and redundant whitespace from an SVG document
    pub fn optimize(&self, input: &str) -> Result<String> {
        if !self.svg_root.is_match(input) {
            return Err(GatewayError::BadRequest(
                "Body does not contain an <svg> element".to_string(),
            ));
        }

        let mut output = input.to_string();
        for regex in &self.removals {
            output = regex.replace_all(&output, "").into_owned();
        }

        output = self.between_tags.replace_all(&output, "><").into_owned();
        output = self.whitespace.replace_all(&output, " ").into_owned();

        let output = output.trim().to_string();
        if !self.svg_root.is_match(&output) {
            return Err(GatewayError::BadRequest(
                "SVG element did not survive optimization".to_string(),
            ));
        }

        Ok(output)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| GatewayError::Config(format!("Invalid SVG pattern '{}': {}", pattern, e)))
}

/// `POST /api/svg-optimize`
pub async fn svg_optimize_handler(
    State(optimizer): State<Arc<SvgOptimizer>>,
    body: Bytes,
) -> Result<Response> {
    if body.is_empty() {
        return Err(GatewayError::BadRequest("Empty SVG body".to_string()));
    }
    if body.len() > MAX_SVG_BYTES {
        return Err(GatewayError::PayloadTooLarge(format!(
            "SVG exceeds {} bytes",
            MAX_SVG_BYTES
        )));
    }

    let input = std::str::from_utf8(&body)
        .map_err(|_| GatewayError::BadRequest("SVG must be valid UTF-8".to_string()))?;

    let optimized = optimizer.optimize(input)?;

    debug!(
        original = body.len(),
        optimized = optimized.len(),
        "SVG optimized"
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml; charset=utf-8"),
    );
    headers.insert("x-original-size", HeaderValue::from(body.len()));
    headers.insert("x-optimized-size", HeaderValue::from(optimized.len()));

    Ok((StatusCode::OK, headers, optimized).into_response())
}
