use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Process-wide sync state, written by the orchestrator and read by
/// subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStatus {
    /// True only while a reconciliation pass is in flight.
    pub is_syncing: bool,
    /// Completion time of the last successful pass; `None` if never.
    pub last_sync: Option<DateTime<Utc>>,
    /// Number of mutations waiting in the queue.
    pub pending_changes: usize,
    /// Last error message, cleared when a new pass starts.
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn has_unsynced_changes(&self) -> bool {
        self.pending_changes > 0
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_syncing { "syncing" } else { "idle" };
        write!(f, "{}, {} pending", state, self.pending_changes)?;
        match &self.last_sync {
            Some(at) => write!(f, ", last sync {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?,
            None => write!(f, ", never synced")?,
        }
        if let Some(error) = &self.error {
            write!(f, ", error: {}", error)?;
        }
        Ok(())
    }
}
