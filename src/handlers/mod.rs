//! API endpoint handlers

pub mod chat;
pub mod placeholder;
pub mod svg;

pub use chat::{chat_handler, ChatState};
pub use placeholder::placeholder_handler;
pub use svg::{svg_optimize_handler, SvgOptimizer};

use crate::error::GatewayError;
use axum::{http::Uri, Json};
use serde_json::{json, Value};

/// `GET /health`
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fallback for unknown paths
pub async fn not_found_handler(uri: Uri) -> GatewayError {
    GatewayError::NotFound(uri.path().to_string())
}
