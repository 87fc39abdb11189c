//! Application state and router assembly

use crate::config::SiteConfig;
use crate::error::Result;
use crate::gate::{gate_middleware, RequestGate};
use crate::handlers::{
    chat_handler, health_handler, not_found_handler, placeholder_handler, svg_optimize_handler,
    ChatState, SvgOptimizer,
};
use crate::metrics::{metrics_handler, track_metrics, MetricsService};
use crate::observability::request_id_middleware;
use crate::rate_limit::{
    rate_limit_middleware, spawn_cleanup_task, Clock, RateLimitMiddleware, RateLimiter,
    SystemClock,
};
use crate::secrets::SecretsProvider;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

/// One limiter per protected endpoint
#[derive(Debug, Clone)]
pub struct Limiters {
    pub ai_chat: Arc<RateLimiter>,
    pub svg_optimize: Arc<RateLimiter>,
    pub placeholder: Arc<RateLimiter>,
}

impl Limiters {
    pub fn new(config: &SiteConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            ai_chat: Arc::new(RateLimiter::with_clock(config.limits.ai_chat, clock.clone())?),
            svg_optimize: Arc::new(RateLimiter::with_clock(
                config.limits.svg_optimize,
                clock.clone(),
            )?),
            placeholder: Arc::new(RateLimiter::with_clock(config.limits.placeholder, clock)?),
        })
    }

    fn named(&self) -> [(&'static str, &Arc<RateLimiter>); 3] {
        [
            ("ai-chat", &self.ai_chat),
            ("svg-optimize", &self.svg_optimize),
            ("placeholder", &self.placeholder),
        ]
    }

    /// Start one cleanup task per limiter; a zero period schedules nothing
    pub fn spawn_cleanup(&self, period: Duration) -> Vec<JoinHandle<()>> {
        if period.is_zero() {
            info!("Rate limiter cleanup disabled");
            return Vec::new();
        }

        self.named()
            .into_iter()
            .map(|(name, limiter)| spawn_cleanup_task(name, limiter.clone(), period))
            .collect()
    }
}

/// Shared application state, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub limiters: Limiters,
    pub chat: ChatState,
    pub svg: Arc<SvgOptimizer>,
    pub metrics: Option<MetricsService>,
}

impl AppState {
    /// Build state driven by the wall clock
    pub fn new(config: &SiteConfig, secrets: &dyn SecretsProvider) -> Result<Self> {
        Self::with_clock(config, secrets, Arc::new(SystemClock))
    }

    /// Build state with an injected limiter clock
    pub fn with_clock(
        config: &SiteConfig,
        secrets: &dyn SecretsProvider,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let api_key = secrets.optional_secret(&config.chat.api_key_secret);
        let chat = ChatState::new(
            config.chat.clone(),
            api_key,
            Duration::from_secs(config.server.timeout_secs),
        )?;

        Ok(Self {
            gate: Arc::new(RequestGate::new()?),
            limiters: Limiters::new(config, clock)?,
            chat,
            svg: Arc::new(SvgOptimizer::new()?),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsService) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

fn limited(name: &'static str, limiter: &Arc<RateLimiter>) -> RateLimitMiddleware {
    RateLimitMiddleware::new(name, limiter.clone())
}

/// Assemble the router: gate on every route, one limiter per API endpoint
pub fn build_router(state: AppState) -> Router {
    let chat = Router::new()
        .route("/api/ai-chat", post(chat_handler))
        .route_layer(from_fn_with_state(
            limited("ai-chat", &state.limiters.ai_chat),
            rate_limit_middleware,
        ))
        .with_state(state.chat.clone());

    let svg = Router::new()
        .route("/api/svg-optimize", post(svg_optimize_handler))
        .route_layer(from_fn_with_state(
            limited("svg-optimize", &state.limiters.svg_optimize),
            rate_limit_middleware,
        ))
        .with_state(state.svg.clone());

    let placeholder = Router::new()
        .route("/api/placeholder", get(placeholder_handler))
        .route_layer(from_fn_with_state(
            limited("placeholder", &state.limiters.placeholder),
            rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .merge(chat)
        .merge(svg)
        .merge(placeholder);

    if let Some(metrics) = state.metrics.clone() {
        app = app.route("/metrics", get(metrics_handler).with_state(metrics));
    }

    app.fallback(not_found_handler)
        .layer(from_fn_with_state(state.gate.clone(), gate_middleware))
        .layer(from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
}
