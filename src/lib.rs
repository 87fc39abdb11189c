pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod observability;
pub mod rate_limit;
pub mod secrets;
pub mod server;

use crate::config::SiteConfig;
use crate::error::{GatewayError, Result};
use crate::metrics::MetricsService;
use crate::secrets::EnvSecretsProvider;
use crate::server::{build_router, AppState};
use std::time::Duration;
use tracing::info;

pub use observability::init_tracing;

/// Initialize the edge server and serve until shutdown
pub async fn init_gateway(config: SiteConfig) -> Result<()> {
    config.validate()?;

    info!("Starting portfolio edge server");

    let secrets = EnvSecretsProvider::default();
    let mut state = AppState::new(&config, &secrets)?;

    if config.metrics.enabled {
        state = state.with_metrics(MetricsService::new()?);
    }

    let cleanup_tasks = state
        .limiters
        .spawn_cleanup(Duration::from_secs(config.limits.cleanup_interval_secs));

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(GatewayError::Io)?;

    info!(address = %addr, "Server ready to accept connections");

    let served = axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Internal(format!("Server error: {}", e)));

    for task in cleanup_tasks {
        task.abort();
    }

    served
}
