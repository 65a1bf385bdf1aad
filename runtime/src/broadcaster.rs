//! Connectivity broadcaster.
//!
//! The background agent that outlives any single client. It remembers the
//! last status it announced and fans every change out to all registered
//! clients. Delivery is fire-and-forget: a client whose channel is closed
//! simply misses the message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use storefront_engine::ConnectivityMessage;
use tokio::sync::mpsc;

use crate::monitor::Probe;
use crate::now_ms;
use crate::platform::Platform;

/// Sender for messages to one client.
pub type ClientSender = mpsc::UnboundedSender<ConnectivityMessage>;

/// Receiver a client reads broadcasts from.
pub type ClientInbox = mpsc::UnboundedReceiver<ConnectivityMessage>;

/// A request from a client, tagged with who sent it.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub client_id: String,
    pub message: ConnectivityMessage,
}

/// Fans connectivity status out to every open client.
pub struct Broadcaster {
    last_known: AtomicBool,
    clients: DashMap<String, ClientSender>,
    probe: Arc<dyn Probe>,
    platform: Arc<dyn Platform>,
}

impl Broadcaster {
    /// Create a broadcaster whose initial status is the platform's.
    pub fn new(probe: Arc<dyn Probe>, platform: Arc<dyn Platform>) -> Self {
        Self {
            last_known: AtomicBool::new(platform.is_online()),
            clients: DashMap::new(),
            probe,
            platform,
        }
    }

    /// Create a broadcaster wrapped in Arc for sharing.
    pub fn new_shared(probe: Arc<dyn Probe>, platform: Arc<dyn Platform>) -> Arc<Self> {
        Arc::new(Self::new(probe, platform))
    }

    /// Register a client. Returns the client ID and its inbox.
    pub fn register(&self, label: &str) -> (String, ClientInbox) {
        let client_id = format!("{label}-{}", uuid::Uuid::new_v4());
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(client_id.clone(), tx);
        tracing::info!(client_id = %client_id, "Client registered");
        (client_id, rx)
    }

    /// Register a client that supplies its own channel.
    pub fn register_sender(&self, client_id: String, sender: ClientSender) {
        tracing::info!(client_id = %client_id, "Client registered");
        self.clients.insert(client_id, sender);
    }

    /// Unregister a client.
    pub fn unregister(&self, client_id: &str) {
        if self.clients.remove(client_id).is_some() {
            tracing::info!(client_id = %client_id, "Client unregistered");
        }
    }

    /// Last status announced.
    pub fn last_known_status(&self) -> bool {
        self.last_known.load(Ordering::SeqCst)
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Announce `is_online` if it differs from the last announced status.
    ///
    /// Returns the number of clients that received the message (0 when the
    /// status did not change).
    pub fn broadcast(&self, is_online: bool) -> usize {
        self.announce(is_online, None)
    }

    /// Like [`broadcast`](Self::broadcast), for a status a client observed
    /// itself. The reporting client is skipped; it already knows.
    pub fn broadcast_except(&self, sender_id: &str, is_online: bool) -> usize {
        self.announce(is_online, Some(sender_id))
    }

    fn announce(&self, is_online: bool, except: Option<&str>) -> usize {
        if self.last_known.swap(is_online, Ordering::SeqCst) == is_online {
            return 0;
        }
        tracing::info!(is_online, "Connectivity changed");
        self.send_all(ConnectivityMessage::status(is_online, now_ms()), except)
    }

    /// Probe now and announce the result to every client, changed or not.
    pub async fn check_now(&self) -> usize {
        let reachable = self.platform.is_online() && self.probe.probe().await;
        self.last_known.store(reachable, Ordering::SeqCst);
        self.send_all(ConnectivityMessage::status(reachable, now_ms()), None)
    }

    /// Handle one client request.
    pub async fn handle(&self, request: ClientRequest) -> usize {
        match request.message {
            ConnectivityMessage::CheckConnectivity => {
                tracing::debug!(client_id = %request.client_id, "Connectivity check requested");
                self.check_now().await
            }
            ConnectivityMessage::ConnectivityStatus { is_online, .. } => {
                self.broadcast_except(&request.client_id, is_online)
            }
        }
    }

    /// Process client requests until every sender is dropped.
    pub async fn serve(self: Arc<Self>, mut requests: mpsc::UnboundedReceiver<ClientRequest>) {
        while let Some(request) = requests.recv().await {
            self.handle(request).await;
        }
        tracing::debug!("Broadcaster request channel closed");
    }

    fn send_all(&self, message: ConnectivityMessage, except: Option<&str>) -> usize {
        let mut sent_count = 0;
        let mut closed = Vec::new();

        for entry in self.clients.iter() {
            if except == Some(entry.key().as_str()) {
                continue;
            }
            if entry.value().send(message).is_ok() {
                sent_count += 1;
            } else {
                closed.push(entry.key().clone());
            }
        }

        for client_id in closed {
            self.unregister(&client_id);
        }

        tracing::debug!(recipients = sent_count, "Broadcast connectivity status");

        sent_count
    }
}
