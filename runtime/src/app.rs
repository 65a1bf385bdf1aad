//! Wiring of one offline-capable client.
//!
//! [`OfflineRuntime`] is built once at startup and owns every shared piece:
//! the platform flag, the broadcaster, the monitor, the context and the cart
//! coordinator. Consumers receive these by reference instead of reaching for
//! globals.

use std::sync::Arc;

use storefront_engine::KeyValueStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::backend::{Backend, HttpBackend};
use crate::broadcaster::Broadcaster;
use crate::config::Config;
use crate::context::{Connectivity, ConnectivityContext};
use crate::coordinator::{CartCoordinator, CoordinatorSettings};
use crate::error::Result;
use crate::file_store::FileStore;
use crate::monitor::{ConnectivityMonitor, HttpProbe, Probe};
use crate::platform::{NetworkFlag, Platform};

/// Everything a client needs to keep working offline.
pub struct OfflineRuntime {
    pub platform: Arc<NetworkFlag>,
    pub broadcaster: Arc<Broadcaster>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub context: Arc<ConnectivityContext>,
    pub coordinator: Arc<CartCoordinator>,
    client_id: String,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl OfflineRuntime {
    /// Start against the HTTP backend and the file store named in `config`.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(
            config.api_base_url.clone(),
            config.request_timeout,
        )?);
        let probe = Arc::new(HttpProbe::new(config.health_url(), config.probe_timeout));
        let store = Arc::new(FileStore::open(&config.storage_dir)?);
        tracing::info!(
            api = %config.api_base_url,
            storage = %config.storage_dir.display(),
            "Starting offline runtime"
        );
        Ok(Self::start_with(
            config,
            backend,
            probe,
            store,
            Arc::new(NetworkFlag::default()),
        ))
    }

    /// Start with explicit collaborators.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn start_with(
        config: &Config,
        backend: Arc<dyn Backend>,
        probe: Arc<dyn Probe>,
        store: Arc<dyn KeyValueStore>,
        platform: Arc<NetworkFlag>,
    ) -> Self {
        let dyn_platform: Arc<dyn Platform> = platform.clone();
        let broadcaster = Broadcaster::new_shared(probe.clone(), dyn_platform.clone());
        let monitor = Arc::new(ConnectivityMonitor::new(
            probe,
            dyn_platform.clone(),
            broadcaster.clone(),
            config.probe_interval,
        ));
        let context = Arc::new(
            ConnectivityContext::new(platform.is_online(), config.notification_display)
                .with_store(store.clone()),
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (client_id, inbox) = broadcaster.register("runtime");

        let mut tasks = vec![
            tokio::spawn(broadcaster.clone().serve(requests_rx)),
            tokio::spawn(monitor.clone().run(shutdown_rx)),
            context.connect(client_id.clone(), inbox, requests_tx),
        ];

        let coordinator = Arc::new(CartCoordinator::new(
            config.user_id.clone(),
            backend,
            store,
            Connectivity::from(context.clone()),
            dyn_platform,
            CoordinatorSettings::from(config),
        ));
        tasks.extend(coordinator.spawn_reconnect_drain());

        Self {
            platform,
            broadcaster,
            monitor,
            context,
            coordinator,
            client_id,
            shutdown,
            tasks,
        }
    }

    /// Deliver a native online/offline event from the host.
    pub fn native_event(&self, is_online: bool) {
        self.platform.set_online(is_online);
        self.context.handle_native(is_online);
    }

    /// Stop background work. In-flight results are no longer written to
    /// memory.
    pub async fn shutdown(self) {
        self.coordinator.unmount();
        let _ = self.shutdown.send(true);
        self.broadcaster.unregister(&self.client_id);
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("Offline runtime stopped");
    }
}
