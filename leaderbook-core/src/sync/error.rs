//! Sync error types.

use thiserror::Error;

use crate::models::MutationKind;
use crate::remote::RemoteError;
use crate::store::StoreError;

/// Errors from the action queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Update and delete payloads must name the entity they target.
    #[error("{kind} on {collection} requires an 'id' in the payload")]
    MissingId {
        kind: MutationKind,
        collection: String,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Terminal state of a record that failed too many times. Logged when
    /// the record is dropped; never returned to callers.
    #[error("Mutation {id} dropped after {attempts} failed attempts (last error: {last_error})")]
    MaxRetriesExceeded {
        id: String,
        attempts: u32,
        last_error: String,
    },
}

/// Failure to reconcile one collection.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
