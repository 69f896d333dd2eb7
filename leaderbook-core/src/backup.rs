//! Export and import of the local cache and the pending queue.
//!
//! A backup is a single JSON document carrying a SHA-256 checksum of its
//! data section, so a truncated or hand-edited file is rejected on import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{CollectionSnapshot, MutationRecord};
use crate::store::{DurableStore, StoreError};

/// Format version written by this build.
pub const BACKUP_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported backup version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Backup checksum mismatch: file may be corrupted")]
    ChecksumMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the serialized `data`.
    pub checksum: String,
    pub data: BackupData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    pub snapshots: Vec<CollectionSnapshot>,
    pub queue: Vec<MutationRecord>,
}

/// Counts restored by [`import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub snapshots: usize,
    pub queued: usize,
}

impl Backup {
    pub fn new(data: BackupData) -> Result<Self, BackupError> {
        Ok(Self {
            version: BACKUP_VERSION,
            created_at: Utc::now(),
            checksum: checksum(&data)?,
            data,
        })
    }

    pub fn verify(&self) -> Result<(), BackupError> {
        if self.version != BACKUP_VERSION {
            return Err(BackupError::UnsupportedVersion {
                found: self.version,
                expected: BACKUP_VERSION,
            });
        }
        if checksum(&self.data)? != self.checksum {
            return Err(BackupError::ChecksumMismatch);
        }
        Ok(())
    }
}

fn checksum(data: &BackupData) -> Result<String, BackupError> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(data)?);
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Collects every cached snapshot and queued record.
pub async fn export(store: &dyn DurableStore) -> Result<Backup, BackupError> {
    let data = BackupData {
        snapshots: store.list_snapshots().await?,
        queue: store.list_queued().await?,
    };
    tracing::info!(
        "Exported {} snapshot(s) and {} queued mutation(s)",
        data.snapshots.len(),
        data.queue.len()
    );
    Backup::new(data)
}

/// Restores a verified backup into `store`.
///
/// Snapshots replace the cached copies of their collections. Records are
/// upserted by id, so importing the same backup twice queues nothing new.
pub async fn import(
    store: &dyn DurableStore,
    backup: &Backup,
) -> Result<ImportSummary, BackupError> {
    backup.verify()?;

    for snapshot in &backup.data.snapshots {
        store.put_snapshot(snapshot).await?;
    }
    for record in &backup.data.queue {
        store.enqueue(record).await?;
    }

    let summary = ImportSummary {
        snapshots: backup.data.snapshots.len(),
        queued: backup.data.queue.len(),
    };
    tracing::info!(
        "Imported {} snapshot(s) and {} queued mutation(s)",
        summary.snapshots,
        summary.queued
    );
    Ok(summary)
}

pub fn write_file(backup: &Backup, path: &Path) -> Result<(), BackupError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(backup)?)?;
    Ok(())
}

pub fn read_file(path: &Path) -> Result<Backup, BackupError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
