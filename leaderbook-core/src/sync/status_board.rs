//! Shared holder of the process-wide [`SyncStatus`].

use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::models::SyncStatus;
use crate::publisher::{StatusPublisher, Subscription};

/// Current sync status plus the subscribers that observe it.
///
/// Every change is published with the full status after the change.
pub struct StatusBoard {
    status: Mutex<SyncStatus>,
    publisher: StatusPublisher,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(SyncStatus::default()),
            publisher: StatusPublisher::new(),
        }
    }

    pub fn current(&self) -> SyncStatus {
        self.lock().clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.publisher.subscribe(listener)
    }

    /// Updates the pending count, publishing only if it changed.
    pub fn set_pending(&self, pending: usize) {
        let changed = {
            let mut status = self.lock();
            let changed = status.pending_changes != pending;
            status.pending_changes = pending;
            changed.then(|| status.clone())
        };
        if let Some(status) = changed {
            self.publisher.notify(&status);
        }
    }

    /// Enters the `Syncing` state. Returns `None` if a pass is already in
    /// flight.
    ///
    /// The check and the flag update happen under one lock, so two callers
    /// can never both begin.
    pub fn begin(&self) -> Option<PassGuard<'_>> {
        let started = {
            let mut status = self.lock();
            if status.is_syncing {
                return None;
            }
            status.is_syncing = true;
            status.error = None;
            status.clone()
        };
        self.publisher.notify(&started);
        Some(PassGuard {
            board: self,
            finished: false,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that a pass is in flight. Dropping it without calling
/// [`PassGuard::finish`] (a panicking pass) still releases the flag.
pub struct PassGuard<'a> {
    board: &'a StatusBoard,
    finished: bool,
}

impl PassGuard<'_> {
    /// Leaves the `Syncing` state and publishes the final status.
    ///
    /// `last_sync` is only overwritten when `Some`.
    pub fn finish(
        mut self,
        last_sync: Option<DateTime<Utc>>,
        pending: usize,
        error: Option<String>,
    ) -> SyncStatus {
        self.finished = true;
        let final_status = {
            let mut status = self.board.lock();
            if last_sync.is_some() {
                status.last_sync = last_sync;
            }
            status.pending_changes = pending;
            status.error = error;
            status.is_syncing = false;
            status.clone()
        };
        self.board.publisher.notify(&final_status);
        final_status
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let aborted = {
            let mut status = self.board.lock();
            status.is_syncing = false;
            status.error = Some("Sync pass aborted".to_string());
            status.clone()
        };
        self.board.publisher.notify(&aborted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_begin_is_exclusive() {
        let board = StatusBoard::new();
        let guard = board.begin().unwrap();
        assert!(board.current().is_syncing);
        assert!(board.begin().is_none());

        guard.finish(Some(Utc::now()), 0, None);
        assert!(!board.current().is_syncing);
        assert!(board.begin().is_some());
    }

    #[test]
    fn test_begin_clears_previous_error() {
        let board = StatusBoard::new();
        board
            .begin()
            .unwrap()
            .finish(None, 1, Some("people: timeout".to_string()));
        assert_eq!(board.current().error.as_deref(), Some("people: timeout"));

        let _guard = board.begin().unwrap();
        assert!(board.current().error.is_none());
    }

    #[test]
    fn test_finish_without_last_sync_keeps_previous() {
        let board = StatusBoard::new();
        let first = Utc::now();
        board.begin().unwrap().finish(Some(first), 0, None);
        board
            .begin()
            .unwrap()
            .finish(None, 2, Some("queue: disk full".to_string()));

        let status = board.current();
        assert_eq!(status.last_sync, Some(first));
        assert_eq!(status.pending_changes, 2);
    }

    #[test]
    fn test_dropped_guard_releases_flag() {
        let board = StatusBoard::new();
        drop(board.begin().unwrap());

        let status = board.current();
        assert!(!status.is_syncing);
        assert!(status.error.is_some());
    }

    #[test]
    fn test_dropped_guard_publishes_release() {
        let board = StatusBoard::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            board.subscribe(move |s| seen.lock().unwrap().push(s.is_syncing))
        };

        drop(board.begin().unwrap());

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_set_pending_publishes_changes_only() {
        let board = StatusBoard::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let calls = calls.clone();
            board.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        board.set_pending(1);
        board.set_pending(1);
        board.set_pending(0);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
