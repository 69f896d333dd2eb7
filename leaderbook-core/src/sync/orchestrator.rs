//! Sync passes: drain the queue, then reconcile every collection.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use super::error::ReconcileError;
use super::merge::merge_remote_wins;
use super::queue::{ActionQueue, DrainReport};
use super::status_board::StatusBoard;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{CollectionSnapshot, SyncStatus};
use crate::remote::{with_timeout, RemoteStore};
use crate::store::DurableStore;

/// Result of a [`SyncOrchestrator::sync`] call.
#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was in flight; nothing was done.
    AlreadyInProgress,
    /// The client is offline; nothing was done.
    Offline,
}

/// Summary of one completed pass.
#[derive(Debug)]
pub struct SyncReport {
    /// `None` if the drain aborted on a store error.
    pub drain: Option<DrainReport>,
    pub collections: Vec<CollectionReport>,
    /// Status published at the end of the pass.
    pub status: SyncStatus,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.status.error.is_none()
    }
}

/// Reconcile result for one collection. `Ok` carries the merged item count.
#[derive(Debug)]
pub struct CollectionReport {
    pub collection: String,
    pub result: Result<usize, ReconcileError>,
}

/// Runs sync passes. At most one pass is in flight at a time.
pub struct SyncOrchestrator {
    queue: Arc<ActionQueue>,
    store: Arc<dyn DurableStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    status: Arc<StatusBoard>,
    collections: Vec<String>,
    remote_timeout: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        queue: Arc<ActionQueue>,
        store: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
        status: Arc<StatusBoard>,
        collections: Vec<String>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            remote,
            connectivity,
            status,
            collections,
            remote_timeout,
        }
    }

    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    /// Runs one pass. Never fails: drain and collection errors are joined
    /// into the published status.
    pub async fn sync(&self) -> SyncOutcome {
        if self.status.current().is_syncing {
            tracing::debug!("Sync already in progress");
            return SyncOutcome::AlreadyInProgress;
        }

        if !self.connectivity.is_online() {
            self.status.set_pending(self.queue.len());
            tracing::debug!("Offline, skipping sync");
            return SyncOutcome::Offline;
        }

        let Some(pass) = self.status.begin() else {
            return SyncOutcome::AlreadyInProgress;
        };

        let mut errors = Vec::new();

        let drain = match self.queue.drain_queue().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!("Queue drain aborted: {}", e);
                errors.push(format!("queue: {}", e));
                None
            }
        };

        let results = join_all(self.collections.iter().map(|c| self.reconcile(c))).await;

        let collections: Vec<CollectionReport> = self
            .collections
            .iter()
            .zip(results)
            .map(|(collection, result)| {
                if let Err(e) = &result {
                    tracing::warn!("Failed to sync {}: {}", collection, e);
                    errors.push(format!("{}: {}", collection, e));
                }
                CollectionReport {
                    collection: collection.clone(),
                    result,
                }
            })
            .collect();

        let error = (!errors.is_empty()).then(|| errors.join("; "));
        let last_sync = drain.is_some().then(Utc::now);
        let status = pass.finish(last_sync, self.queue.len(), error);

        tracing::info!("Sync pass finished: {}", status);

        SyncOutcome::Completed(SyncReport {
            drain,
            collections,
            status,
        })
    }

    /// Manual trigger; the same pass as [`SyncOrchestrator::sync`].
    pub async fn force_sync(&self) -> SyncOutcome {
        self.sync().await
    }

    async fn reconcile(&self, collection: &str) -> Result<usize, ReconcileError> {
        let remote = with_timeout(self.remote_timeout, self.remote.list(collection)).await?;

        let _cache = self.queue.lock_cache().await;
        let local = self
            .store
            .get_snapshot(collection)
            .await?
            .map(|snapshot| snapshot.items)
            .unwrap_or_default();

        let merged = merge_remote_wins(remote, local);
        let count = merged.len();
        self.store
            .put_snapshot(&CollectionSnapshot::new(collection, merged))
            .await?;

        tracing::debug!("Reconciled {} ({} items)", collection, count);
        Ok(count)
    }
}
