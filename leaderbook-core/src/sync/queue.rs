//! Offline action queue.
//!
//! Mutations are executed against the remote store straight away when the
//! client is online. Otherwise, or when the immediate attempt fails, they
//! are persisted to the durable store and replayed later by
//! [`ActionQueue::drain_queue`], oldest first, with a bounded number of
//! attempts.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use super::error::QueueError;
use super::status_board::StatusBoard;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{entity_id, Entity, MutationKind, MutationRecord};
use crate::remote::{with_timeout, RemoteStore};
use crate::store::{DurableStore, StoreError};

/// A record is dropped once it has failed this many times.
pub const MAX_ATTEMPTS: u32 = 3;

/// What happened to a submitted mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Executed remotely. Carries the stored entity (`None` for deletes).
    Applied(Option<Entity>),
    /// Queued for a later drain under the given record id.
    Queued(String),
}

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    /// Failed but still queued for another attempt.
    pub failed: usize,
    /// Failed for the last time and removed.
    pub dropped: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded == 0 && self.failed == 0 && self.dropped == 0
    }
}

/// Queue of mutations waiting for the remote store.
///
/// The in-memory mirror answers size and listing queries without touching
/// the store. The store stays authoritative: other processes may share it,
/// so every drain reloads the mirror first.
pub struct ActionQueue {
    store: Arc<dyn DurableStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    status: Arc<StatusBoard>,
    remote_timeout: Duration,
    mirror: Mutex<VecDeque<MutationRecord>>,
    /// Ids of records the store refused; they exist only in the mirror.
    unpersisted: Mutex<HashSet<String>>,
    /// Serializes read-modify-write of cached snapshots with reconcile.
    cache_lock: tokio::sync::Mutex<()>,
}

impl ActionQueue {
    pub fn new(
        store: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
        status: Arc<StatusBoard>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            status,
            remote_timeout,
            mirror: Mutex::new(VecDeque::new()),
            unpersisted: Mutex::new(HashSet::new()),
            cache_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Reloads the mirror from the durable store.
    pub async fn restore(&self) -> Result<usize, StoreError> {
        let count = self.reload().await?;
        if count > 0 {
            tracing::info!("Restored {} pending mutation(s)", count);
        }
        Ok(count)
    }

    /// Rebuilds the mirror from the store, keeping records that only ever
    /// lived in memory.
    async fn reload(&self) -> Result<usize, StoreError> {
        let stored = self.store.list_queued().await?;
        let unpersisted = self.unpersisted_ids().clone();

        let count = {
            let mut mirror = self.mirror();
            let mut records: VecDeque<MutationRecord> = stored.into();
            let memory_only: Vec<MutationRecord> = mirror
                .iter()
                .filter(|r| unpersisted.contains(&r.id))
                .filter(|r| !records.iter().any(|s| s.id == r.id))
                .cloned()
                .collect();
            if !memory_only.is_empty() {
                records.extend(memory_only);
                records.make_contiguous().sort_by_key(|r| r.enqueued_at);
            }
            *mirror = records;
            mirror.len()
        };

        self.status.set_pending(count);
        Ok(count)
    }

    /// Number of queued mutations.
    pub fn len(&self) -> usize {
        self.mirror().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirror().is_empty()
    }

    /// Queued mutations, oldest first.
    pub fn records(&self) -> Vec<MutationRecord> {
        self.mirror().iter().cloned().collect()
    }

    /// Submits a mutation.
    ///
    /// Online submits run immediately; any failure there falls back to
    /// queueing, so a mutation is never silently dropped. The only error is
    /// a payload that cannot be executed at all.
    pub async fn submit(
        &self,
        kind: MutationKind,
        collection: &str,
        payload: Value,
    ) -> Result<SubmitOutcome, QueueError> {
        if kind.requires_id() && entity_id(&payload).is_none() {
            return Err(QueueError::MissingId {
                kind,
                collection: collection.to_string(),
            });
        }

        if self.connectivity.is_online() {
            match self.execute(kind, collection, &payload).await {
                Ok(entity) => {
                    tracing::debug!("Applied {} on {} directly", kind, collection);
                    self.status.set_pending(self.len());
                    return Ok(SubmitOutcome::Applied(entity));
                }
                Err(e) => {
                    tracing::warn!("{} on {} failed, queueing for retry: {}", kind, collection, e);
                }
            }
        }

        let record = MutationRecord::new(kind, collection, payload);
        let id = record.id.clone();

        if let Err(e) = self.store.enqueue(&record).await {
            self.unpersisted_ids().insert(id.clone());
            tracing::warn!(
                "Could not persist mutation {}; keeping it in memory only: {}",
                id,
                e
            );
        }
        self.apply_to_cache(&record).await;

        let pending = {
            let mut mirror = self.mirror();
            if !mirror.iter().any(|r| r.id == id) {
                mirror.push_back(record);
            }
            mirror.len()
        };
        self.status.set_pending(pending);

        tracing::debug!("Queued mutation {} ({} pending)", id, pending);
        Ok(SubmitOutcome::Queued(id))
    }

    /// Replays queued mutations against the remote store.
    ///
    /// The mirror is first reloaded from the store, so records queued by
    /// another process are picked up. Records queued when the pass starts
    /// run one at a time, oldest first. Each one is checked against the
    /// store right before it runs and skipped if something else already
    /// dequeued it. A success is removed from the store before the next
    /// record runs, so an interrupted drain never replays an applied
    /// mutation. A failure bumps the record's attempt count; reaching
    /// [`MAX_ATTEMPTS`] drops it.
    ///
    /// No-op when offline or empty. A store error aborts the pass.
    pub async fn drain_queue(&self) -> Result<DrainReport, StoreError> {
        let mut report = DrainReport::default();
        if !self.connectivity.is_online() {
            return Ok(report);
        }

        self.reload().await?;
        let pending = self.records();
        if pending.is_empty() {
            return Ok(report);
        }

        tracing::info!("Draining {} queued mutation(s)", pending.len());

        for mut record in pending {
            let memory_only = self.unpersisted_ids().contains(&record.id);
            if !memory_only && !self.store.is_queued(&record.id).await? {
                tracing::debug!("Skipping {}; no longer queued", record);
                self.remove_from_mirror(&record.id);
                continue;
            }

            match self
                .execute(record.kind, &record.collection, &record.payload)
                .await
            {
                Ok(_) => {
                    self.store.dequeue(&record.id).await?;
                    self.remove_from_mirror(&record.id);
                    report.succeeded += 1;
                    tracing::debug!("Applied queued {}", record);
                }
                Err(e) => {
                    record.attempts += 1;
                    if record.attempts >= MAX_ATTEMPTS {
                        self.store.dequeue(&record.id).await?;
                        self.remove_from_mirror(&record.id);
                        report.dropped += 1;

                        let terminal = QueueError::MaxRetriesExceeded {
                            id: record.id.clone(),
                            attempts: record.attempts,
                            last_error: e.to_string(),
                        };
                        tracing::error!(
                            collection = %record.collection,
                            kind = %record.kind,
                            "{}",
                            terminal
                        );
                    } else {
                        self.store.enqueue(&record).await?;
                        self.unpersisted_ids().remove(&record.id);
                        self.replace_in_mirror(&record);
                        report.failed += 1;
                        tracing::warn!("Queued {} failed, will retry: {}", record, e);
                    }
                }
            }
        }

        tracing::info!(
            "Drain finished: {} applied, {} failed, {} dropped",
            report.succeeded,
            report.failed,
            report.dropped
        );
        Ok(report)
    }

    /// Empties the queue and the collection cache.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.clear_all().await?;
        self.mirror().clear();
        self.unpersisted_ids().clear();
        self.status.set_pending(0);
        Ok(())
    }

    async fn execute(
        &self,
        kind: MutationKind,
        collection: &str,
        payload: &Value,
    ) -> Result<Option<Entity>, QueueError> {
        let remote = self.remote.as_ref();
        let id = entity_id(payload);
        let missing_id = || QueueError::MissingId {
            kind,
            collection: collection.to_string(),
        };

        match kind {
            MutationKind::Create => {
                let entity =
                    with_timeout(self.remote_timeout, remote.create(collection, payload)).await?;
                Ok(Some(entity))
            }
            MutationKind::Update => {
                let id = id.ok_or_else(missing_id)?;
                let entity =
                    with_timeout(self.remote_timeout, remote.update(collection, &id, payload))
                        .await?;
                Ok(Some(entity))
            }
            MutationKind::Delete => {
                let id = id.ok_or_else(missing_id)?;
                with_timeout(self.remote_timeout, remote.delete(collection, &id)).await?;
                Ok(None)
            }
        }
    }

    /// Holds off other snapshot rewrites for as long as the guard lives.
    pub(crate) async fn lock_cache(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.cache_lock.lock().await
    }

    /// Reflects a queued mutation in the cached snapshot so offline reads
    /// see it. Collections never fetched stay uncached. Cache failures are
    /// logged; the queued record is what counts.
    async fn apply_to_cache(&self, record: &MutationRecord) {
        let Some(id) = record.entity_id() else {
            return;
        };

        let _cache = self.lock_cache().await;
        let result = async {
            let Some(mut snapshot) = self.store.get_snapshot(&record.collection).await? else {
                return Ok(());
            };

            match record.kind {
                MutationKind::Create => {
                    snapshot.items.insert(id, record.payload.clone());
                }
                MutationKind::Update => {
                    let entry = snapshot
                        .items
                        .entry(id)
                        .or_insert_with(|| Value::Object(Default::default()));
                    merge_fields(entry, &record.payload);
                }
                MutationKind::Delete => {
                    snapshot.items.remove(&id);
                }
            }

            self.store.put_snapshot(&snapshot).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("Could not update cached {}: {}", record.collection, e);
        }
    }

    fn remove_from_mirror(&self, id: &str) {
        self.mirror().retain(|r| r.id != id);
        self.unpersisted_ids().remove(id);
        self.status.set_pending(self.len());
    }

    fn replace_in_mirror(&self, record: &MutationRecord) {
        if let Some(existing) = self.mirror().iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        }
    }

    fn mirror(&self) -> std::sync::MutexGuard<'_, VecDeque<MutationRecord>> {
        self.mirror.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unpersisted_ids(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.unpersisted.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shallow field overwrite of `target` with the fields of `patch`.
fn merge_fields(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionSnapshot;
    use crate::remote::RemoteError;
    use crate::store::MemoryStore;
    use crate::testing::{Call, FakeRemote, FlakyStore};
    use serde_json::json;

    struct Fixture {
        queue: ActionQueue,
        remote: Arc<FakeRemote>,
        store: Arc<FlakyStore>,
        connectivity: Arc<ConnectivityMonitor>,
        status: Arc<StatusBoard>,
    }

    fn fixture(online: bool) -> Fixture {
        let remote = Arc::new(FakeRemote::new());
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let connectivity = Arc::new(ConnectivityMonitor::new(online));
        let status = Arc::new(StatusBoard::new());
        let queue = ActionQueue::new(
            store.clone(),
            remote.clone(),
            connectivity.clone(),
            status.clone(),
            Duration::from_secs(5),
        );
        Fixture {
            queue,
            remote,
            store,
            connectivity,
            status,
        }
    }

    #[tokio::test]
    async fn test_online_submit_applies_without_queueing() {
        let f = fixture(true);

        let outcome = f
            .queue
            .submit(MutationKind::Create, "people", json!({"id": "p1", "full_name": "Ana"}))
            .await
            .unwrap();

        assert!(matches!(outcome, SubmitOutcome::Applied(Some(_))));
        assert!(f.queue.is_empty());
        assert!(f.store.list_queued().await.unwrap().is_empty());
        assert!(f.store.get_snapshot("people").await.unwrap().is_none());
        assert_eq!(f.remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_submit_queues() {
        let f = fixture(false);

        let outcome = f
            .queue
            .submit(MutationKind::Create, "people", json!({"id": "p1", "full_name": "Ana"}))
            .await
            .unwrap();

        let SubmitOutcome::Queued(id) = outcome else {
            panic!("expected queued outcome");
        };
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.status.current().pending_changes, 1);

        let stored = f.store.list_queued().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].attempts, 0);
        assert!(f.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_online_submit_falls_back_to_queue() {
        let f = fixture(true);
        f.remote.set_failing(true);

        let outcome = f
            .queue
            .submit(MutationKind::Update, "tags", json!({"id": "t1", "name": "VIP"}))
            .await
            .unwrap();

        assert!(matches!(outcome, SubmitOutcome::Queued(_)));
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_requires_id_for_update_and_delete() {
        let f = fixture(false);

        let result = f
            .queue
            .submit(MutationKind::Delete, "tags", json!({"name": "VIP"}))
            .await;

        assert!(matches!(result, Err(QueueError::MissingId { .. })));
        assert!(f.queue.is_empty());
    }

    #[tokio::test]
    async fn test_submit_survives_store_failure() {
        let f = fixture(false);
        f.store.set_failing(true);

        let outcome = f
            .queue
            .submit(MutationKind::Create, "people", json!({"id": "p1"}))
            .await
            .unwrap();

        assert!(matches!(outcome, SubmitOutcome::Queued(_)));
        assert_eq!(f.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_only_record_drains_after_store_recovers() {
        let f = fixture(false);
        f.store.set_failing(true);
        f.queue
            .submit(MutationKind::Create, "people", json!({"id": "p1"}))
            .await
            .unwrap();
        f.store.set_failing(false);
        f.connectivity.set_online(true);

        let report = f.queue.drain_queue().await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert!(f.queue.is_empty());
        assert_eq!(f.remote.rows("people"), vec![json!({"id": "p1"})]);
    }

    #[tokio::test]
    async fn test_drain_picks_up_records_queued_elsewhere() {
        let f = fixture(true);
        let record = MutationRecord::new(MutationKind::Create, "tags", json!({"id": "t9"}));
        f.store.enqueue(&record).await.unwrap();
        assert!(f.queue.is_empty());

        let report = f.queue.drain_queue().await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(f.remote.rows("tags"), vec![json!({"id": "t9"})]);
        assert!(f.store.list_queued().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_skips_records_dequeued_elsewhere() {
        let f = fixture(false);
        let SubmitOutcome::Queued(id) = f
            .queue
            .submit(MutationKind::Create, "people", json!({"id": "p1"}))
            .await
            .unwrap()
        else {
            panic!("expected queued outcome");
        };
        f.store.dequeue(&id).await.unwrap();
        f.connectivity.set_online(true);

        let report = f.queue.drain_queue().await.unwrap();

        assert!(report.is_empty());
        assert!(f.queue.is_empty());
        assert!(f.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_update_waits_for_snapshot_lock() {
        let f = fixture(false);
        f.store
            .put_snapshot(&CollectionSnapshot::new("tags", Default::default()))
            .await
            .unwrap();

        let held = f.queue.lock_cache().await;
        let submit = f
            .queue
            .submit(MutationKind::Create, "tags", json!({"id": "t2"}));
        tokio::pin!(submit);
        assert!(futures::poll!(&mut submit).is_pending());

        // A reconcile rewrites the snapshot while holding the lock
        f.store
            .put_snapshot(&CollectionSnapshot::new(
                "tags",
                crate::models::index_by_id(vec![json!({"id": "t1"})]),
            ))
            .await
            .unwrap();
        drop(held);
        submit.await.unwrap();

        let tags = f.store.get_snapshot("tags").await.unwrap().unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.items.contains_key("t1"));
        assert!(tags.items.contains_key("t2"));
    }

    #[tokio::test]
    async fn test_offline_submit_updates_cache() {
        let f = fixture(false);
        f.store
            .put_snapshot(&CollectionSnapshot::new("tags", Default::default()))
            .await
            .unwrap();

        f.queue
            .submit(MutationKind::Create, "tags", json!({"id": "t2", "name": "Local"}))
            .await
            .unwrap();
        f.queue
            .submit(MutationKind::Update, "tags", json!({"id": "t2", "color": "red"}))
            .await
            .unwrap();

        let tags = f.store.get_snapshot("tags").await.unwrap().unwrap();
        assert_eq!(tags.items["t2"], json!({"id": "t2", "name": "Local", "color": "red"}));

        f.queue
            .submit(MutationKind::Delete, "tags", json!({"id": "t2"}))
            .await
            .unwrap();
        let tags = f.store.get_snapshot("tags").await.unwrap().unwrap();
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn test_unfetched_collection_stays_uncached() {
        let f = fixture(false);

        f.queue
            .submit(MutationKind::Create, "leaders", json!({"id": "l1"}))
            .await
            .unwrap();

        assert!(f.store.get_snapshot("leaders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drain_in_fifo_order() {
        let f = fixture(false);
        f.queue
            .submit(MutationKind::Create, "people", json!({"id": "1", "full_name": "A"}))
            .await
            .unwrap();
        f.queue
            .submit(MutationKind::Update, "people", json!({"id": "1", "full_name": "B"}))
            .await
            .unwrap();

        f.connectivity.set_online(true);
        let report = f.queue.drain_queue().await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                succeeded: 2,
                failed: 0,
                dropped: 0
            }
        );
        assert_eq!(
            f.remote.calls(),
            vec![
                Call::Create("people".to_string(), json!({"id": "1", "full_name": "A"})),
                Call::Update(
                    "people".to_string(),
                    "1".to_string(),
                    json!({"id": "1", "full_name": "B"})
                ),
            ]
        );
        assert!(f.queue.is_empty());
        assert!(f.store.list_queued().await.unwrap().is_empty());
        assert_eq!(f.status.current().pending_changes, 0);
    }

    #[tokio::test]
    async fn test_retry_ceiling() {
        let f = fixture(false);
        f.queue
            .submit(MutationKind::Delete, "leaders", json!({"id": "l1"}))
            .await
            .unwrap();
        f.connectivity.set_online(true);
        f.remote.set_failing(true);

        let first = f.queue.drain_queue().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.store.list_queued().await.unwrap()[0].attempts, 1);

        let second = f.queue.drain_queue().await.unwrap();
        assert_eq!(second.failed, 1);
        assert_eq!(f.queue.records()[0].attempts, 2);
        assert_eq!(f.status.current().pending_changes, 1);

        let third = f.queue.drain_queue().await.unwrap();
        assert_eq!(third.dropped, 1);
        assert!(f.queue.is_empty());
        assert!(f.store.list_queued().await.unwrap().is_empty());
        assert_eq!(f.status.current().pending_changes, 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_later_records() {
        let f = fixture(false);
        f.queue
            .submit(MutationKind::Update, "people", json!({"id": "missing", "full_name": "X"}))
            .await
            .unwrap();
        f.queue
            .submit(MutationKind::Create, "people", json!({"id": "p2"}))
            .await
            .unwrap();
        f.connectivity.set_online(true);

        let report = f.queue.drain_queue().await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(f.queue.records()[0].entity_id(), Some("missing".to_string()));
    }

    #[tokio::test]
    async fn test_drain_empty_or_offline_is_noop() {
        let f = fixture(true);
        let before = f.status.current();
        assert!(f.queue.drain_queue().await.unwrap().is_empty());
        assert_eq!(f.status.current(), before);

        let f = fixture(false);
        f.queue
            .submit(MutationKind::Create, "tags", json!({"id": "t1"}))
            .await
            .unwrap();
        assert!(f.queue.drain_queue().await.unwrap().is_empty());
        assert_eq!(f.queue.len(), 1);
        assert!(f.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_drain_aborts_on_store_error() {
        let f = fixture(false);
        f.queue
            .submit(MutationKind::Create, "tags", json!({"id": "t1"}))
            .await
            .unwrap();
        f.connectivity.set_online(true);
        f.store.set_failing(true);

        let result = f.queue.drain_queue().await;

        assert!(result.is_err());
        // The remote call happened but the record stays queued
        assert_eq!(f.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_rebuilds_mirror() {
        let f = fixture(false);
        f.queue
            .submit(MutationKind::Create, "tags", json!({"id": "t1"}))
            .await
            .unwrap();

        let reloaded = ActionQueue::new(
            f.store.clone(),
            f.remote.clone(),
            f.connectivity.clone(),
            Arc::new(StatusBoard::new()),
            Duration::from_secs(5),
        );
        assert_eq!(reloaded.restore().await.unwrap(), 1);
        assert_eq!(reloaded.records(), f.queue.records());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_remote_times_out() {
        let f = fixture(true);
        f.remote.set_hanging(true);

        let outcome = f
            .queue
            .submit(MutationKind::Create, "tags", json!({"id": "t1"}))
            .await
            .unwrap();

        assert!(matches!(outcome, SubmitOutcome::Queued(_)));
    }

    #[test]
    fn test_merge_fields() {
        let mut target = json!({"id": "1", "a": 1, "b": 2});
        merge_fields(&mut target, &json!({"id": "1", "b": 3}));
        assert_eq!(target, json!({"id": "1", "a": 1, "b": 3}));
    }

    #[test]
    fn test_remote_error_converts() {
        let err: QueueError = RemoteError::Connectivity("down".to_string()).into();
        assert_eq!(err.to_string(), "Connection error: down");
    }
}
