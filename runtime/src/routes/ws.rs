//! WebSocket endpoint for connectivity clients.

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::handlers::handle_client_connection;
use crate::AgentState;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub client_id: Option<String>,
}

/// Create WebSocket routes.
pub fn routes() -> Router<AgentState> {
    Router::new().route("/ws", get(ws_handler))
}

/// GET /ws?client_id=... - Upgrade to a broadcast subscription.
async fn ws_handler(
    State(state): State<AgentState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let client_id = query
        .client_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::BadRequest("client_id is required".to_string()))?;

    let broadcaster = state.broadcaster.clone();
    Ok(ws.on_upgrade(move |socket| handle_client_connection(socket, broadcaster, client_id)))
}
