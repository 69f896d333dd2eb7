//! Contract of the hosted data store the engine reconciles against.

mod http;

pub use http::HttpRemote;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::Entity;

/// Errors returned by a remote store.
///
/// The engine counts every variant as one failed attempt; it does not
/// distinguish retryable from terminal failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Transport failure or a transient server error.
    #[error("Connection error: {0}")]
    Connectivity(String),

    /// The call did not settle within the configured timeout.
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The store refused the write (constraint violation, validation...).
    #[error("Rejected by remote store ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The targeted entity does not exist remotely.
    #[error("Not found in {collection}: {id}")]
    NotFound { collection: String, id: String },
}

/// Per-collection CRUD operations of the remote data store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full list of a collection, most recently updated first.
    async fn list(&self, collection: &str) -> Result<Vec<Entity>, RemoteError>;

    async fn create(&self, collection: &str, payload: &Entity) -> Result<Entity, RemoteError>;

    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Entity,
    ) -> Result<Entity, RemoteError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

/// Stand-in used when no remote store is configured. Every call fails with
/// a connectivity error, so mutations stay queued locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

impl Unconfigured {
    fn error() -> RemoteError {
        RemoteError::Connectivity("no remote store configured".to_string())
    }
}

#[async_trait]
impl RemoteStore for Unconfigured {
    async fn list(&self, _collection: &str) -> Result<Vec<Entity>, RemoteError> {
        Err(Self::error())
    }

    async fn create(&self, _collection: &str, _payload: &Entity) -> Result<Entity, RemoteError> {
        Err(Self::error())
    }

    async fn update(
        &self,
        _collection: &str,
        _id: &str,
        _payload: &Entity,
    ) -> Result<Entity, RemoteError> {
        Err(Self::error())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), RemoteError> {
        Err(Self::error())
    }
}

/// Bounds a remote call by `limit`, turning an unsettled call into
/// `RemoteError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, RemoteError>
where
    F: std::future::Future<Output = Result<T, RemoteError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout(limit)))
}
