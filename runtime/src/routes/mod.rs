//! HTTP route definitions.

mod health;
mod ws;

use crate::AgentState;
use axum::Router;

/// Create all agent routes.
pub fn create_routes() -> Router<AgentState> {
    Router::new().merge(health::routes()).merge(ws::routes())
}
