//! Background sync triggers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::orchestrator::SyncOrchestrator;

/// Runs sync passes on a fixed interval and whenever the client comes back
/// online.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Spawns the scheduler task. The first pass runs immediately.
    ///
    /// `online` is the connectivity watch channel; each transition to
    /// `true` triggers a pass. Overlapping triggers are harmless because
    /// the orchestrator rejects a pass while another is in flight.
    pub fn start(
        orchestrator: Arc<SyncOrchestrator>,
        mut online: watch::Receiver<bool>,
        interval: Duration,
    ) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Cleared if the monitor is dropped, after which only ticks fire
            let mut watching = true;

            tracing::info!("Sync scheduler started (every {:?})", interval);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        orchestrator.sync().await;
                    }
                    changed = online.changed(), if watching => {
                        match changed {
                            Ok(()) => {
                                if *online.borrow_and_update() {
                                    tracing::debug!("Back online, triggering sync");
                                    orchestrator.sync().await;
                                }
                            }
                            Err(_) => watching = false,
                        }
                    }
                }
            }

            tracing::info!("Sync scheduler stopped");
        });

        SchedulerHandle {
            shutdown: Some(shutdown),
            task,
        }
    }
}

/// Stop handle for a running [`SyncScheduler`].
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the scheduler and waits for it to exit. A pass already in
    /// flight finishes first.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Sync scheduler task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
