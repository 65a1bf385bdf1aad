//! Tests for the agent's HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use storefront_runtime::{
    routes, AgentState, Broadcaster, Config, ConnectivityMonitor, NetworkFlag, Probe,
};
use tower::ServiceExt;

struct Reachable(bool);

#[async_trait]
impl Probe for Reachable {
    async fn probe(&self) -> bool {
        self.0
    }
}

fn app(reachable: bool) -> (Router, AgentState) {
    let probe: Arc<dyn Probe> = Arc::new(Reachable(reachable));
    let platform = Arc::new(NetworkFlag::new(true));
    let broadcaster = Broadcaster::new_shared(probe.clone(), platform.clone());
    let monitor = Arc::new(ConnectivityMonitor::new(
        probe,
        platform,
        broadcaster.clone(),
        Duration::from_secs(30),
    ));
    let state = AgentState {
        broadcaster,
        monitor,
        config: Arc::new(Config::default()),
    };
    let router = routes::create_routes().with_state(state.clone());
    (router, state)
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_reports_status_and_clients() {
    let (router, state) = app(true);
    let (_id, _inbox) = state.broadcaster.register("tab");

    let (status, body) = get_json(router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["online"], true);
    assert_eq!(body["clients"], 1);
    assert_eq!(body["backend"], "http://localhost:3000");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn health_reflects_failed_probe() {
    let (router, state) = app(false);
    state.monitor.check().await;

    let (_, body) = get_json(router, "/health").await;
    assert_eq!(body["backend_reachable"], false);
    assert_eq!(body["online"], false);
}

#[tokio::test]
async fn root_names_the_agent() {
    let (router, _) = app(true);
    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ws_requires_an_upgrade() {
    let (router, _) = app(true);
    let response = router
        .oneshot(
            Request::builder()
                .uri("/ws?client_id=tab-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
