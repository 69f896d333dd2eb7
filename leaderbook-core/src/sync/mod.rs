//! Offline queue and sync orchestration.
//!
//! ## Flow
//!
//! 1. [`ActionQueue::submit`] runs a mutation remotely when online, or
//!    persists it to the durable store when not
//! 2. [`SyncOrchestrator::sync`] drains the queue oldest first, then fetches
//!    every configured collection and merges it into the local cache
//! 3. [`StatusBoard`] publishes a [`crate::models::SyncStatus`] on every
//!    change
//!
//! At most one pass is in flight at a time. Remote entities win on merge.

mod error;
mod merge;
mod orchestrator;
mod queue;
mod scheduler;
mod status_board;

pub use error::{QueueError, ReconcileError};
pub use merge::merge_remote_wins;
pub use orchestrator::{CollectionReport, SyncOrchestrator, SyncOutcome, SyncReport};
pub use queue::{ActionQueue, DrainReport, SubmitOutcome, MAX_ATTEMPTS};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use status_board::{PassGuard, StatusBoard};
