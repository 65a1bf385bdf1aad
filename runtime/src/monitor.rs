//! Connectivity monitor.
//!
//! Combines the platform's network flag with an active probe of the backend's
//! health endpoint. The probe runs periodically and on demand, and every
//! result goes to the [`Broadcaster`], which announces it when it differs
//! from what clients were last told.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storefront_engine::{ConnectivityState, SignalSource, Transition};
use tokio::sync::watch;

use crate::broadcaster::Broadcaster;
use crate::now_ms;
use crate::platform::Platform;

/// Active reachability check. Never fails: any error means unreachable.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// `HEAD` request against the backend's health endpoint.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self) -> bool {
        let result = self
            .client
            .head(&self.url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %self.url, "Health probe failed: {}", e);
                false
            }
        }
    }
}

fn log_transition(transition: Transition) {
    tracing::info!(
        previous = transition.previous,
        current = transition.current,
        "Backend reachability changed"
    );
}

/// Tracks backend reachability and reports it to the broadcaster.
pub struct ConnectivityMonitor {
    probe: Arc<dyn Probe>,
    platform: Arc<dyn Platform>,
    broadcaster: Arc<Broadcaster>,
    state: Mutex<ConnectivityState>,
    interval: Duration,
}

impl ConnectivityMonitor {
    pub fn new(
        probe: Arc<dyn Probe>,
        platform: Arc<dyn Platform>,
        broadcaster: Arc<Broadcaster>,
        interval: Duration,
    ) -> Self {
        let initial = platform.is_online();
        Self {
            probe,
            platform,
            broadcaster,
            state: Mutex::new(ConnectivityState::new(initial, now_ms())),
            interval,
        }
    }

    /// Probe the backend once. Returns whether it is reachable.
    ///
    /// A platform that reports itself offline is not probed.
    pub async fn probe(&self) -> bool {
        self.platform.is_online() && self.probe.probe().await
    }

    /// Probe, record the result and hand it to the broadcaster.
    ///
    /// Clients may have announced a different status since the last probe,
    /// so the result is offered every time; the broadcaster drops repeats.
    pub async fn check(&self) -> bool {
        let reachable = self.probe().await;
        if let Some(transition) = self.observe(reachable) {
            log_transition(transition);
        }
        self.broadcaster.broadcast(reachable);
        reachable
    }

    /// Last recorded reachability.
    pub fn is_online(&self) -> bool {
        self.lock_state().is_online()
    }

    fn observe(&self, reachable: bool) -> Option<Transition> {
        self.lock_state()
            .observe(reachable, SignalSource::Probe, now_ms())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ConnectivityState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Check every interval until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Connectivity monitor stopped");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::ClientRequest;
    use crate::platform::NetworkFlag;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use storefront_engine::ConnectivityMessage;

    struct SwitchProbe {
        up: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Probe for SwitchProbe {
        async fn probe(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.up.load(Ordering::SeqCst)
        }
    }

    fn setup(up: bool) -> (Arc<SwitchProbe>, Arc<NetworkFlag>, Arc<Broadcaster>, ConnectivityMonitor) {
        let probe = Arc::new(SwitchProbe {
            up: AtomicBool::new(up),
            calls: AtomicUsize::new(0),
        });
        let platform = Arc::new(NetworkFlag::new(true));
        let broadcaster = Broadcaster::new_shared(probe.clone(), platform.clone());
        let monitor = ConnectivityMonitor::new(
            probe.clone(),
            platform.clone(),
            broadcaster.clone(),
            Duration::from_secs(30),
        );
        (probe, platform, broadcaster, monitor)
    }

    fn status_of(message: ConnectivityMessage) -> bool {
        match message {
            ConnectivityMessage::ConnectivityStatus { is_online, .. } => is_online,
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcasts_only_on_transition() {
        let (probe, _platform, broadcaster, monitor) = setup(true);
        let (_id, mut rx) = broadcaster.register("tab");

        assert!(monitor.check().await);
        assert!(rx.try_recv().is_err());

        probe.up.store(false, Ordering::SeqCst);
        assert!(!monitor.check().await);
        assert!(!monitor.check().await);

        assert!(!status_of(rx.try_recv().unwrap()));
        assert!(rx.try_recv().is_err());
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn next_check_corrects_a_mirrored_offline_status() {
        let (_probe, _platform, broadcaster, monitor) = setup(true);
        let (tab_a, _rx_a) = broadcaster.register("tab");
        let (_tab_b, mut rx_b) = broadcaster.register("tab");

        broadcaster
            .handle(ClientRequest {
                client_id: tab_a,
                message: ConnectivityMessage::status(false, 0),
            })
            .await;
        assert!(!status_of(rx_b.try_recv().unwrap()));

        // The backend never went away, so the monitor saw no transition
        assert!(monitor.check().await);
        assert!(monitor.is_online());
        assert!(broadcaster.last_known_status());
        assert!(status_of(rx_b.try_recv().unwrap()));

        assert!(monitor.check().await);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_platform_skips_the_probe() {
        let (probe, platform, _broadcaster, monitor) = setup(true);
        platform.set_online(false);

        assert!(!monitor.check().await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_probes_periodically_until_shutdown() {
        let (probe, _platform, _broadcaster, monitor) = setup(true);
        let monitor = Arc::new(monitor);
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(monitor.clone().run(shutdown));

        // First tick fires immediately, then every 30s
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        stop.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn http_probe_treats_connection_errors_as_unreachable() {
        // Port 9 on loopback has nothing listening
        let probe = HttpProbe::new("http://127.0.0.1:9/api/health-check", Duration::from_millis(500));
        assert!(!probe.probe().await);
    }
}
