//! Connectivity context: the single source of truth for `is_online` inside one
//! running client.
//!
//! Native network events and broadcaster messages both drive the same state;
//! neither takes precedence, the last one wins. Every transition produces one
//! notification, and subscribers receive typed [`ContextEvent`]s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use storefront_engine::{
    keys, ConnectivityMessage, ConnectivityState, ConnectivityStatus, KeyValueStore, Notification,
    NotificationCenter, NotificationKind, SignalSource, Transition,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broadcaster::{ClientInbox, ClientRequest};
use crate::now_ms;
use crate::platform::Platform;

/// Something that happened inside the context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    /// The online flag flipped.
    StatusChanged {
        is_online: bool,
        source: SignalSource,
    },
    /// The platform fired a native `online` event. Published on every such
    /// event, whether or not the flag flipped; this is the drain trigger.
    NetworkRestored,
    /// A notification was shown.
    Notification(Notification),
}

/// A live subscription. Dropping it, or passing its ID to
/// [`ConnectivityContext::unsubscribe`], ends it.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    receiver: mpsc::UnboundedReceiver<ContextEvent>,
}

impl Subscription {
    /// Wait for the next event. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<ContextEvent> {
        self.receiver.recv().await
    }

    /// Take an event if one is ready.
    pub fn try_recv(&mut self) -> Option<ContextEvent> {
        self.receiver.try_recv().ok()
    }
}

struct BroadcasterLink {
    client_id: String,
    outbox: mpsc::UnboundedSender<ClientRequest>,
}

/// Per-client connectivity state, notifications and event fan-out.
pub struct ConnectivityContext {
    state: Mutex<ConnectivityState>,
    notifications: Arc<Mutex<NotificationCenter>>,
    display: Duration,
    subscribers: DashMap<u64, mpsc::UnboundedSender<ContextEvent>>,
    next_subscriber: AtomicU64,
    link: Mutex<Option<BroadcasterLink>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl ConnectivityContext {
    /// Create a context starting in the platform's current reachability.
    pub fn new(is_online: bool, display: Duration) -> Self {
        Self {
            state: Mutex::new(ConnectivityState::new(is_online, now_ms())),
            notifications: Arc::new(Mutex::new(NotificationCenter::new(
                display.as_millis() as u64,
            ))),
            display,
            subscribers: DashMap::new(),
            next_subscriber: AtomicU64::new(1),
            link: Mutex::new(None),
            store: None,
        }
    }

    /// Persist the connection state under `connectionState` on every
    /// transition.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Current online flag.
    pub fn is_online(&self) -> bool {
        lock(&self.state).is_online()
    }

    /// Current status with its timestamp.
    pub fn status(&self) -> ConnectivityStatus {
        lock(&self.state).status()
    }

    /// Visible notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut center = lock(&self.notifications);
        center.expire(now_ms());
        center.active().to_vec()
    }

    /// Subscribe to context events.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        Subscription { id, receiver: rx }
    }

    /// End a subscription.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.remove(&id);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Show a notification for the display duration.
    ///
    /// A missing title or message makes this a no-op returning `None`.
    pub fn show_notification(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Option<u64> {
        let notification = lock(&self.notifications).show(title, message, kind, now_ms())?;
        let id = notification.id;

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let notifications = Arc::clone(&self.notifications);
            let display = self.display;
            handle.spawn(async move {
                tokio::time::sleep(display).await;
                lock(&notifications).dismiss(id);
            });
        }

        self.publish(ContextEvent::Notification(notification));
        Some(id)
    }

    /// Handle a native online/offline event from the platform.
    pub fn handle_native(&self, is_online: bool) -> Option<Transition> {
        let transition = self.apply(is_online, SignalSource::Native);
        self.mirror(is_online);
        if is_online {
            self.publish(ContextEvent::NetworkRestored);
        }
        transition
    }

    /// Handle a message pushed by the broadcaster.
    pub fn handle_broadcast(&self, message: ConnectivityMessage) -> Option<Transition> {
        match message {
            ConnectivityMessage::ConnectivityStatus { is_online, .. } => {
                self.apply(is_online, SignalSource::Broadcast)
            }
            ConnectivityMessage::CheckConnectivity => {
                tracing::warn!("Ignoring CHECK_CONNECTIVITY sent to a client");
                None
            }
        }
    }

    /// Ask the broadcaster to probe and announce the current status.
    ///
    /// Returns false when the context is not connected to a broadcaster.
    pub fn request_check(&self) -> bool {
        self.send_to_broadcaster(ConnectivityMessage::CheckConnectivity)
    }

    /// Connect to a broadcaster: remember where to send requests and spawn a
    /// task applying every message from `inbox`.
    pub fn connect(
        self: &Arc<Self>,
        client_id: String,
        inbox: ClientInbox,
        outbox: mpsc::UnboundedSender<ClientRequest>,
    ) -> JoinHandle<()> {
        *lock(&self.link) = Some(BroadcasterLink {
            client_id: client_id.clone(),
            outbox,
        });

        let context = Arc::clone(self);
        let mut inbox = inbox;
        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                context.handle_broadcast(message);
            }
            tracing::debug!(client_id = %client_id, "Broadcaster inbox closed");
        })
    }

    fn apply(&self, is_online: bool, source: SignalSource) -> Option<Transition> {
        let transition = lock(&self.state).observe(is_online, source, now_ms())?;

        tracing::info!(is_online, ?source, "Connectivity transition");
        self.persist_state(is_online);
        if is_online {
            self.show_notification(
                "Connection restored",
                "Your internet connection has been restored",
                NotificationKind::Success,
            );
        } else {
            self.show_notification(
                "No connection",
                "No internet connection. Offline mode activated",
                NotificationKind::Warning,
            );
        }
        self.publish(ContextEvent::StatusChanged { is_online, source });
        Some(transition)
    }

    fn persist_state(&self, is_online: bool) {
        if let Some(store) = &self.store {
            let value = if is_online { "online" } else { "offline" };
            if let Err(e) = store.set(keys::CONNECTION_STATE, value) {
                tracing::warn!("Failed to persist connection state: {}", e);
            }
        }
    }

    fn mirror(&self, is_online: bool) {
        self.send_to_broadcaster(ConnectivityMessage::status(is_online, now_ms()));
    }

    fn send_to_broadcaster(&self, message: ConnectivityMessage) -> bool {
        match &*lock(&self.link) {
            Some(link) => link
                .outbox
                .send(ClientRequest {
                    client_id: link.client_id.clone(),
                    message,
                })
                .is_ok(),
            None => false,
        }
    }

    fn publish(&self, event: ContextEvent) {
        self.subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }
}

/// What UI-level code holds: the context when one exists, otherwise the raw
/// platform flag.
#[derive(Clone)]
pub enum Connectivity {
    Attached(Arc<ConnectivityContext>),
    Detached(Arc<dyn Platform>),
}

impl Connectivity {
    /// Fallback used when no context was provided.
    pub fn detached(platform: Arc<dyn Platform>) -> Self {
        tracing::warn!("Connectivity context unavailable, falling back to the platform flag");
        Connectivity::Detached(platform)
    }

    /// Current online belief.
    pub fn is_online(&self) -> bool {
        match self {
            Connectivity::Attached(context) => context.is_online(),
            Connectivity::Detached(platform) => platform.is_online(),
        }
    }

    /// Show a notification. A detached handle does nothing.
    pub fn show_notification(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Option<u64> {
        match self {
            Connectivity::Attached(context) => context.show_notification(title, message, kind),
            Connectivity::Detached(_) => None,
        }
    }

    /// The context, when attached.
    pub fn context(&self) -> Option<&Arc<ConnectivityContext>> {
        match self {
            Connectivity::Attached(context) => Some(context),
            Connectivity::Detached(_) => None,
        }
    }
}

impl From<Arc<ConnectivityContext>> for Connectivity {
    fn from(context: Arc<ConnectivityContext>) -> Self {
        Connectivity::Attached(context)
    }
}
