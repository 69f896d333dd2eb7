//! The sync engine context object.
//!
//! [`SyncEngine`] wires the durable store, the remote store, the
//! connectivity monitor, the action queue and the orchestrator together.
//! Build it once and share it behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::backup::{self, Backup, BackupError, ImportSummary};
use crate::connectivity::ConnectivityMonitor;
use crate::models::{CollectionSnapshot, MutationKind, MutationRecord, SyncStatus};
use crate::publisher::Subscription;
use crate::remote::RemoteStore;
use crate::store::{DurableStore, StoreError};
use crate::sync::{
    ActionQueue, QueueError, SchedulerHandle, StatusBoard, SubmitOutcome, SyncOrchestrator,
    SyncOutcome, SyncScheduler,
};

/// Collections reconciled when none are configured.
pub const DEFAULT_COLLECTIONS: [&str; 3] = ["people", "leaders", "tags"];

/// Upper bound on any single remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub collections: Vec<String>,
    pub remote_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            collections: DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

pub struct SyncEngine {
    store: Arc<dyn DurableStore>,
    connectivity: Arc<ConnectivityMonitor>,
    status: Arc<StatusBoard>,
    queue: Arc<ActionQueue>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl SyncEngine {
    /// Builds the engine and reloads any mutations queued by a previous run.
    pub async fn new(
        store: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
        options: EngineOptions,
    ) -> Result<Self, StoreError> {
        let status = Arc::new(StatusBoard::new());
        let queue = Arc::new(ActionQueue::new(
            store.clone(),
            remote.clone(),
            connectivity.clone(),
            status.clone(),
            options.remote_timeout,
        ));
        queue.restore().await?;

        let orchestrator = Arc::new(SyncOrchestrator::new(
            queue.clone(),
            store.clone(),
            remote,
            connectivity.clone(),
            status.clone(),
            options.collections,
            options.remote_timeout,
        ));

        if !store.is_persistent() {
            tracing::warn!("Using volatile storage; queued changes will not survive a restart");
        }

        Ok(Self {
            store,
            connectivity,
            status,
            queue,
            orchestrator,
        })
    }

    pub async fn submit(
        &self,
        kind: MutationKind,
        collection: &str,
        payload: Value,
    ) -> Result<SubmitOutcome, QueueError> {
        self.queue.submit(kind, collection, payload).await
    }

    pub async fn sync(&self) -> SyncOutcome {
        self.orchestrator.sync().await
    }

    pub async fn force_sync(&self) -> SyncOutcome {
        self.orchestrator.force_sync().await
    }

    /// Registers a status listener; it is called with the full status after
    /// every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.status.subscribe(listener)
    }

    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_records(&self) -> Vec<MutationRecord> {
        self.queue.records()
    }

    pub fn is_offline(&self) -> bool {
        !self.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn collections(&self) -> &[String] {
        self.orchestrator.collections()
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Cached items of a collection, or `None` if it was never fetched.
    pub async fn snapshot(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionSnapshot>, StoreError> {
        self.store.get_snapshot(collection).await
    }

    pub async fn snapshots(&self) -> Result<Vec<CollectionSnapshot>, StoreError> {
        self.store.list_snapshots().await
    }

    /// Drops every queued mutation and every cached snapshot.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.queue.clear().await?;
        tracing::info!("Cleared local cache and pending queue");
        Ok(())
    }

    /// Starts periodic and on-reconnect syncing.
    pub fn start_scheduler(&self, interval: Duration) -> SchedulerHandle {
        SyncScheduler::start(
            self.orchestrator.clone(),
            self.connectivity.watch(),
            interval,
        )
    }

    pub async fn export_backup(&self) -> Result<Backup, BackupError> {
        backup::export(self.store.as_ref()).await
    }

    /// Restores a backup and reloads the queue from the store.
    pub async fn import_backup(&self, backup: &Backup) -> Result<ImportSummary, BackupError> {
        let summary = backup::import(self.store.as_ref(), backup).await?;
        self.queue.restore().await?;
        Ok(summary)
    }
}
