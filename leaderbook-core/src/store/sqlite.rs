//! SQLite-backed durable store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;

use super::{DurableStore, StoreError};
use crate::models::{CollectionSnapshot, Entity, MutationKind, MutationRecord};

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: String,
    kind: String,
    collection: String,
    payload: String,
    enqueued_at: String,
    attempts: i64,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    collection: String,
    items: String,
    last_synced_at: String,
}

/// Durable store persisted in a local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and runs migrations.
    ///
    /// Opening an existing database keeps its contents. Any failure to
    /// reach the file is reported as `StorageUnavailable`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::StorageUnavailable(format!("{}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("{}: {}", path.display(), e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("{}: {}", path.display(), e)))?;

        Ok(Self { pool })
    }

    /// Wraps an already migrated pool.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn hydrate_record(row: QueueRow) -> Result<MutationRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            table: "mutation_queue",
            key: row.id.clone(),
            reason,
        };

        let kind: MutationKind = row.kind.parse().map_err(corrupt)?;
        let enqueued_at = parse_timestamp(&row.enqueued_at).map_err(corrupt)?;
        let attempts = u32::try_from(row.attempts)
            .map_err(|_| corrupt(format!("invalid attempts {}", row.attempts)))?;

        Ok(MutationRecord {
            kind,
            collection: row.collection,
            payload: serde_json::from_str(&row.payload)?,
            enqueued_at,
            attempts,
            id: row.id,
        })
    }

    fn hydrate_snapshot(row: SnapshotRow) -> Result<CollectionSnapshot, StoreError> {
        let last_synced_at =
            parse_timestamp(&row.last_synced_at).map_err(|reason| StoreError::Corrupt {
                table: "snapshots",
                key: row.collection.clone(),
                reason,
            })?;
        let items: BTreeMap<String, Entity> = serde_json::from_str(&row.items)?;

        Ok(CollectionSnapshot {
            collection: row.collection,
            items,
            last_synced_at,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn put_snapshot(&self, snapshot: &CollectionSnapshot) -> Result<(), StoreError> {
        let items = serde_json::to_string(&snapshot.items)?;
        let last_synced_at = snapshot.last_synced_at.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO snapshots (collection, items, last_synced_at)
            VALUES (?, ?, ?)
            ON CONFLICT(collection) DO UPDATE
            SET items = excluded.items, last_synced_at = excluded.last_synced_at
            "#,
        )
        .bind(&snapshot.collection)
        .bind(&items)
        .bind(&last_synced_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_snapshot(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionSnapshot>, StoreError> {
        let row: Option<SnapshotRow> =
            sqlx::query_as("SELECT collection, items, last_synced_at FROM snapshots WHERE collection = ?")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::hydrate_snapshot).transpose()
    }

    async fn list_snapshots(&self) -> Result<Vec<CollectionSnapshot>, StoreError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            "SELECT collection, items, last_synced_at FROM snapshots ORDER BY collection",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::hydrate_snapshot).collect()
    }

    async fn enqueue(&self, record: &MutationRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record.payload)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO mutation_queue (id, kind, collection, payload, enqueued_at, attempts)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE
            SET kind = excluded.kind,
                collection = excluded.collection,
                payload = excluded.payload,
                attempts = MAX(mutation_queue.attempts, excluded.attempts)
            "#,
        )
        .bind(&record.id)
        .bind(record.kind.to_string())
        .bind(&record.collection)
        .bind(&payload)
        .bind(record.enqueued_at.to_rfc3339())
        .bind(i64::from(record.attempts))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn dequeue(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM mutation_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_queued(&self, id: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mutation_queue WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn list_queued(&self) -> Result<Vec<MutationRecord>, StoreError> {
        let rows: Vec<QueueRow> = sqlx::query_as(
            "SELECT id, kind, collection, payload, enqueued_at, attempts FROM mutation_queue ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::hydrate_record).collect()
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mutation_queue")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM snapshots").execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
