//! Online/offline state tracking.
//!
//! The monitor is a best-effort signal: reading it never blocks and
//! updating it never fails. A transition is published exactly once; setting
//! the state it already has is silent.

use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::publisher::{Publisher, Subscription};

/// Tracks whether the remote store is believed reachable.
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    listeners: Publisher<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            state,
            listeners: Publisher::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Records the current state. Returns true if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
            self.listeners.notify(&online);
        }
        changed
    }

    /// Registers a listener called with the new state on every transition.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Receiver that wakes on every transition, for async consumers.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Handle to a running reachability probe.
pub struct ProbeHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ProbeHandle {
    /// Stops the probe and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.task).await;
    }
}

/// Checks whether `url` answers at all. Any HTTP response counts as
/// reachable; transport errors and timeouts count as unreachable.
pub async fn check_reachable(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, client.get(url).send()).await,
        Ok(Ok(_))
    )
}

/// Probes `url` once and records the result in `monitor`.
pub async fn probe_once(monitor: &ConnectivityMonitor, url: &str, timeout: Duration) -> bool {
    let online = check_reachable(&reqwest::Client::new(), url, timeout).await;
    monitor.set_online(online);
    online
}

/// Periodically probes `url` and feeds the result into `monitor`.
///
/// The first probe runs immediately.
pub fn spawn_probe(
    monitor: std::sync::Arc<ConnectivityMonitor>,
    url: String,
    interval: Duration,
    timeout: Duration,
) -> ProbeHandle {
    let (shutdown, mut shutdown_rx) = oneshot::channel();
    let client = reqwest::Client::new();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let online = check_reachable(&client, &url, timeout).await;
                    let state = if online { "reachable" } else { "unreachable" };
                    tracing::debug!("Probe {}: {}", url, state);
                    monitor.set_online(online);
                }
            }
        }
    });

    ProbeHandle {
        shutdown: Some(shutdown),
        task,
    }
}
