//! Volatile store used when persistent storage is unavailable, and in tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{DurableStore, StoreError};
use crate::models::{CollectionSnapshot, MutationRecord};

#[derive(Debug, Default)]
struct Tables {
    queue: Vec<MutationRecord>,
    snapshots: BTreeMap<String, CollectionSnapshot>,
}

/// In-memory store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        // Poisoning is ignored; no call leaves the tables half-updated.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn put_snapshot(&self, snapshot: &CollectionSnapshot) -> Result<(), StoreError> {
        self.tables()
            .snapshots
            .insert(snapshot.collection.clone(), snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionSnapshot>, StoreError> {
        Ok(self.tables().snapshots.get(collection).cloned())
    }

    async fn list_snapshots(&self) -> Result<Vec<CollectionSnapshot>, StoreError> {
        Ok(self.tables().snapshots.values().cloned().collect())
    }

    async fn enqueue(&self, record: &MutationRecord) -> Result<(), StoreError> {
        let mut tables = self.tables();
        match tables.queue.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                let attempts = existing.attempts.max(record.attempts);
                *existing = record.clone();
                existing.attempts = attempts;
            }
            None => tables.queue.push(record.clone()),
        }
        Ok(())
    }

    async fn dequeue(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let before = tables.queue.len();
        tables.queue.retain(|r| r.id != id);
        Ok(tables.queue.len() < before)
    }

    async fn is_queued(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables().queue.iter().any(|r| r.id == id))
    }

    async fn list_queued(&self) -> Result<Vec<MutationRecord>, StoreError> {
        Ok(self.tables().queue.clone())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut tables = self.tables();
        tables.queue.clear();
        tables.snapshots.clear();
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
