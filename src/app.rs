//! Builds the sync engine a command runs against.

use leaderbook_core::{
    open_store_or_fallback, probe_once, ConnectivityMonitor, HttpRemote, RemoteStore, StoreError,
    SyncEngine, Unconfigured,
};
use std::sync::Arc;

use crate::config::Config;

pub struct App {
    pub engine: SyncEngine,
    /// Health URL of the configured remote, if any
    pub probe_url: Option<String>,
}

impl App {
    /// Opens the local store, sets up the remote and probes it once so the
    /// engine starts with a real online/offline state.
    pub async fn open(config: &Config) -> Result<Self, StoreError> {
        let store = open_store_or_fallback(&config.database_path.value).await;
        let connectivity = Arc::new(ConnectivityMonitor::new(false));

        let (remote, probe_url): (Arc<dyn RemoteStore>, Option<String>) =
            match (&config.remote.url, &config.remote.api_key) {
                (Some(url), Some(api_key)) => {
                    let remote = HttpRemote::new(url.clone(), api_key.clone());
                    let health_url = remote.health_url();
                    (Arc::new(remote), Some(health_url))
                }
                _ => {
                    tracing::debug!("No remote configured; working offline");
                    (Arc::new(Unconfigured), None)
                }
            };

        if let Some(url) = &probe_url {
            probe_once(&connectivity, url, config.remote_timeout()).await;
        }

        let engine =
            SyncEngine::new(store, remote, connectivity, config.engine_options()).await?;

        Ok(Self { engine, probe_url })
    }
}
