//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AgentState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// API being probed
    pub backend: String,
    /// Last status the broadcaster announced
    pub online: bool,
    /// Last probe result
    pub backend_reachable: bool,
    /// Connected clients
    pub clients: usize,
}

/// Create health routes.
pub fn routes() -> Router<AgentState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AgentState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.config.api_base_url.clone(),
        online: state.broadcaster.last_known_status(),
        backend_reachable: state.monitor.is_online(),
        clients: state.broadcaster.client_count(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Storefront Connectivity Agent"
}
