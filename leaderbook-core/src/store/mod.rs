//! Durable local storage for the offline queue and the collection cache.
//!
//! The store holds two logical tables:
//! - queued mutation records, keyed by record id and kept in enqueue order
//! - cached collection snapshots, keyed by collection name
//!
//! Every call is its own transaction: other callers never observe a
//! half-written snapshot or queue entry.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{CollectionSnapshot, MutationRecord};

/// Errors that can occur in the durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Persistent storage could not be opened; callers fall back to memory.
    #[error("Persistent storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded.
    #[error("Corrupt {table} row '{key}': {reason}")]
    Corrupt {
        table: &'static str,
        key: String,
        reason: String,
    },
}

/// Transactional local store behind the action queue and the orchestrator.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Replaces the cached snapshot of `snapshot.collection`.
    async fn put_snapshot(&self, snapshot: &CollectionSnapshot) -> Result<(), StoreError>;

    /// Returns the cached snapshot, or `None` if the collection was never fetched.
    async fn get_snapshot(&self, collection: &str)
        -> Result<Option<CollectionSnapshot>, StoreError>;

    /// All cached snapshots ordered by collection name.
    async fn list_snapshots(&self) -> Result<Vec<CollectionSnapshot>, StoreError>;

    /// Inserts a record, or rewrites it in place if its id is already queued.
    ///
    /// Rewriting keeps the record's queue position and never lowers its
    /// attempt count.
    async fn enqueue(&self, record: &MutationRecord) -> Result<(), StoreError>;

    /// Removes a record. Returns false if no record had that id.
    async fn dequeue(&self, id: &str) -> Result<bool, StoreError>;

    /// True while a record with this id is still queued.
    async fn is_queued(&self, id: &str) -> Result<bool, StoreError>;

    /// Queued records, oldest first.
    async fn list_queued(&self) -> Result<Vec<MutationRecord>, StoreError>;

    /// Empties both tables.
    async fn clear_all(&self) -> Result<(), StoreError>;

    /// False for stores that lose their contents when the process exits.
    fn is_persistent(&self) -> bool;
}

/// Opens the SQLite store at `path`, falling back to a volatile in-memory
/// store when persistent storage is unavailable.
///
/// The fallback is reported once through the log; the queue then lives
/// only as long as the process.
pub async fn open_store_or_fallback(path: impl AsRef<Path>) -> Arc<dyn DurableStore> {
    match SqliteStore::open(path.as_ref()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(
                "{}; pending changes will be kept in memory only and lost on exit",
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}
