//! WebSocket handler for connectivity clients.
//!
//! Each open page holds one connection. Status broadcasts flow out as JSON
//! text frames; `CHECK_CONNECTIVITY` requests and mirrored native events flow
//! in.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use storefront_engine::ConnectivityMessage;
use tokio::sync::mpsc;

use crate::broadcaster::{Broadcaster, ClientRequest};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the client with the broadcaster
/// 2. Spawns a task to forward broadcasts to the socket
/// 3. Processes incoming requests in a loop
/// 4. Unregisters on disconnect
pub async fn handle_client_connection(
    socket: WebSocket,
    broadcaster: Arc<Broadcaster>,
    client_id: String,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ConnectivityMessage>();
    broadcaster.register_sender(client_id.clone(), tx);

    tracing::info!(client_id = %client_id, "WebSocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg.to_json() {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                process_message(&text, &broadcaster, &client_id).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(client_id = %client_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(client_id = %client_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    broadcaster.unregister(&client_id);
    send_task.abort();

    tracing::info!(
        client_id = %client_id,
        active_clients = broadcaster.client_count(),
        "WebSocket client disconnected"
    );
}

/// Parse one client frame and hand it to the broadcaster.
///
/// Unknown shapes are logged and dropped; the protocol has no error reply.
pub(crate) async fn process_message(text: &str, broadcaster: &Broadcaster, client_id: &str) -> usize {
    match ConnectivityMessage::parse(text) {
        Ok(message) => {
            broadcaster
                .handle(ClientRequest {
                    client_id: client_id.to_string(),
                    message,
                })
                .await
        }
        Err(e) => {
            tracing::warn!(client_id = %client_id, "Ignoring client message: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Probe;
    use crate::platform::NetworkFlag;
    use async_trait::async_trait;

    struct Reachable;

    #[async_trait]
    impl Probe for Reachable {
        async fn probe(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn check_request_answers_every_client() {
        let broadcaster = Broadcaster::new(Arc::new(Reachable), Arc::new(NetworkFlag::new(true)));
        let (_id, mut rx) = broadcaster.register("tab");

        let sent = process_message(r#"{"type":"CHECK_CONNECTIVITY"}"#, &broadcaster, "tab-x").await;
        assert_eq!(sent, 1);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ConnectivityMessage::ConnectivityStatus { is_online: true, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_frames_are_dropped() {
        let broadcaster = Broadcaster::new(Arc::new(Reachable), Arc::new(NetworkFlag::new(true)));
        let (_id, mut rx) = broadcaster.register("tab");

        assert_eq!(process_message(r#"{"type":"PING"}"#, &broadcaster, "tab-x").await, 0);
        assert_eq!(process_message("not json", &broadcaster, "tab-x").await, 0);
        assert!(rx.try_recv().is_err());
    }
}
