//! In-process doubles for the remote store and for a failing durable store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::models::{entity_id, CollectionSnapshot, Entity, MutationRecord};
use crate::remote::{RemoteError, RemoteStore};
use crate::store::{DurableStore, MemoryStore, StoreError};

/// A call received by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List(String),
    Create(String, Entity),
    Update(String, String, Entity),
    Delete(String, String),
}

/// Pauses `list` calls until released, so a test can hold a pass open.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Remote store backed by in-memory tables.
#[derive(Default)]
pub struct FakeRemote {
    tables: Mutex<HashMap<String, Vec<Entity>>>,
    calls: Mutex<Vec<Call>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    list_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, collection: &str, rows: Vec<Entity>) {
        self.tables
            .lock()
            .unwrap()
            .insert(collection.to_string(), rows);
    }

    pub fn rows(&self, collection: &str) -> Vec<Entity> {
        self.tables
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Every call fails with a connectivity error while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every call never settles while set.
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn gate_lists(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn record(&self, call: Call) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Connectivity("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn list(&self, collection: &str) -> Result<Vec<Entity>, RemoteError> {
        self.record(Call::List(collection.to_string())).await?;

        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        Ok(self.rows(collection))
    }

    async fn create(&self, collection: &str, payload: &Entity) -> Result<Entity, RemoteError> {
        self.record(Call::Create(collection.to_string(), payload.clone()))
            .await?;

        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(collection.to_string()).or_default();
        let id = entity_id(payload);
        rows.retain(|row| id.is_none() || entity_id(row) != id);
        rows.push(payload.clone());
        Ok(payload.clone())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Entity,
    ) -> Result<Entity, RemoteError> {
        self.record(Call::Update(
            collection.to_string(),
            id.to_string(),
            payload.clone(),
        ))
        .await?;

        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .get_mut(collection)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| entity_id(row).as_deref() == Some(id))
            })
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let (Some(row), Some(patch)) = (row.as_object_mut(), payload.as_object()) {
            for (key, value) in patch {
                row.insert(key.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.record(Call::Delete(collection.to_string(), id.to_string()))
            .await?;

        if let Some(rows) = self.tables.lock().unwrap().get_mut(collection) {
            rows.retain(|row| entity_id(row).as_deref() != Some(id));
        }
        Ok(())
    }
}

/// Memory store whose writes can be made to fail.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::StorageUnavailable("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FlakyStore {
    async fn put_snapshot(&self, snapshot: &CollectionSnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.inner.put_snapshot(snapshot).await
    }

    async fn get_snapshot(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionSnapshot>, StoreError> {
        self.inner.get_snapshot(collection).await
    }

    async fn list_snapshots(&self) -> Result<Vec<CollectionSnapshot>, StoreError> {
        self.inner.list_snapshots().await
    }

    async fn enqueue(&self, record: &MutationRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.enqueue(record).await
    }

    async fn dequeue(&self, id: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.dequeue(id).await
    }

    async fn is_queued(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.is_queued(id).await
    }

    async fn list_queued(&self) -> Result<Vec<MutationRecord>, StoreError> {
        self.inner.list_queued().await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.check()?;
        self.inner.clear_all().await
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
