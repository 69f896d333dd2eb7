//! Leaderbook Core Library
//!
//! Offline-first sync engine for Leaderbook clients: a durable local store
//! for pending mutations and cached collections, an action queue that
//! replays mutations when connectivity returns, and a sync orchestrator
//! that reconciles the cache against the hosted data store.

pub mod backup;
pub mod connectivity;
pub mod engine;
pub mod models;
pub mod publisher;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use backup::{Backup, BackupError, ImportSummary};
pub use connectivity::{probe_once, spawn_probe, ConnectivityMonitor, ProbeHandle};
pub use engine::{EngineOptions, SyncEngine, DEFAULT_COLLECTIONS, DEFAULT_REMOTE_TIMEOUT};
pub use models::{CollectionSnapshot, Entity, MutationKind, MutationRecord, SyncStatus};
pub use publisher::{Publisher, StatusPublisher, Subscription};
pub use remote::{HttpRemote, RemoteError, RemoteStore, Unconfigured};
pub use store::{open_store_or_fallback, DurableStore, MemoryStore, SqliteStore, StoreError};
pub use sync::{
    DrainReport, QueueError, SchedulerHandle, SubmitOutcome, SyncOutcome, SyncReport,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
