use crate::error::{GatewayError, Result};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global Prometheus recorder
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GatewayError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!("folio_requests_total", "Total number of HTTP requests served");
        describe_histogram!(
            "folio_request_duration_seconds",
            "HTTP request latencies in seconds"
        );
        describe_counter!(
            "folio_requests_errors_total",
            "Total number of HTTP requests that resulted in errors"
        );
        describe_counter!(
            "folio_gate_rejections_total",
            "Requests rejected by the request gate, by reason"
        );
        describe_counter!(
            "folio_rate_limit_exceeded_total",
            "Requests rejected due to rate limiting, by endpoint"
        );
        describe_counter!(
            "folio_upstream_requests_total",
            "Requests sent to the chat upstream, by outcome"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Middleware recording count and latency of every request
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let timer = Timer::new(request.method().to_string(), request.uri().path().to_string());
    let response = next.run(request).await;
    timer.record(response.status().as_u16());
    response
}

/// Record a request metric
pub fn record_request(method: &str, path: &str, status: u16, duration: f64) {
    let labels = [
        ("method", method_label(method).to_string()),
        ("path", route_label(path)),
        ("status", status.to_string()),
    ];

    counter!("folio_requests_total", &labels).increment(1);
    histogram!("folio_request_duration_seconds", &labels).record(duration);

    if status >= 400 {
        counter!("folio_requests_errors_total", &labels).increment(1);
    }
}

/// Record a gate rejection
pub fn record_gate_rejection(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!("folio_gate_rejections_total", &labels).increment(1);
}

/// Record rate limit exceeded
pub fn record_rate_limit_exceeded(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!("folio_rate_limit_exceeded_total", &labels).increment(1);
}

/// Record the outcome of a chat upstream call
pub fn record_upstream_request(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!("folio_upstream_requests_total", &labels).increment(1);
}

/// Standard methods keep their name; extension methods share one label
fn method_label(method: &str) -> &'static str {
    const METHODS: &[&str] = &[
        "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "CONNECT", "TRACE",
    ];
    METHODS
        .iter()
        .find(|known| **known == method)
        .copied()
        .unwrap_or("OTHER")
}

/// Routes served by this process, labelled as-is
const KNOWN_ROUTES: &[&str] = &[
    "/",
    "/health",
    "/metrics",
    "/api/ai-chat",
    "/api/svg-optimize",
    "/api/placeholder",
];

/// Top-level page sections; anything below them is folded into `/:slug`
const PAGE_SECTIONS: &[&str] = &["about", "blog", "contact", "garden", "projects", "resume"];

/// Collapse request paths into a bounded label set.
///
/// Unknown paths (scanner probes, typos) all share the `/:unknown` label so
/// the number of series stays fixed.
fn route_label(path: &str) -> String {
    let trimmed = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };

    if let Some(route) = KNOWN_ROUTES.iter().find(|route| **route == trimmed) {
        return route.to_string();
    }

    let mut segments = trimmed.split('/').filter(|s| !s.is_empty());
    let section = segments
        .next()
        .and_then(|first| PAGE_SECTIONS.iter().find(|section| **section == first));

    match (section, segments.next()) {
        (Some(section), None) => format!("/{}", section),
        (Some(section), Some(_)) => format!("/{}/:slug", section),
        (None, _) => "/:unknown".to_string(),
    }
}

/// Timer for measuring request duration
pub struct Timer {
    start: Instant,
    method: String,
    path: String,
}

impl Timer {
    /// Start a new timer for a request
    pub fn new(method: String, path: String) -> Self {
        Self {
            start: Instant::now(),
            method,
            path,
        }
    }

    /// Record the elapsed time with the given status code
    pub fn record(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();
        record_request(&self.method, &self.path, status, duration);
    }
}
