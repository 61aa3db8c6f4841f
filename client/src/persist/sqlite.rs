//! SQLite queue storage.

use super::QueueStore;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use listsync_engine::{Method, QueuedOperation, Sequence};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// A stored queue row.
#[derive(Debug)]
struct StoredOperation {
    sequence: i64,
    op_id: String,
    endpoint: String,
    method: String,
    payload: String,
    attempts: i64,
    enqueued_at: i64,
    origin: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredOperation {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredOperation {
            sequence: row.try_get("sequence")?,
            op_id: row.try_get("op_id")?,
            endpoint: row.try_get("endpoint")?,
            method: row.try_get("method")?,
            payload: row.try_get("payload")?,
            attempts: row.try_get("attempts")?,
            enqueued_at: row.try_get("enqueued_at")?,
            origin: row.try_get("origin")?,
        })
    }
}

impl StoredOperation {
    fn into_operation(self) -> Result<QueuedOperation> {
        let method: Method = self.method.parse()?;
        let payload = serde_json::from_str(&self.payload).map_err(|e| {
            SyncError::QueuePersistence(format!("corrupt payload in row {}: {}", self.sequence, e))
        })?;

        Ok(QueuedOperation {
            sequence: self.sequence as Sequence,
            op_id: self.op_id,
            endpoint: self.endpoint,
            method,
            payload,
            attempts: self.attempts.max(0) as u32,
            enqueued_at: self.enqueued_at.max(0) as u64,
            origin: self.origin,
        })
    }
}

/// Queue stored in a SQLite database, one row per operation.
#[derive(Debug, Clone)]
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    /// Open (or create) the database file and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // Single connection: queue writes are already serialized
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Use an existing pool, running migrations on it.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn insert<'e, E>(executor: E, op: &QueuedOperation) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let payload = serde_json::to_string(&op.payload)
            .map_err(|e| SyncError::QueuePersistence(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO operation_queue (
                sequence, op_id, endpoint, method, payload, attempts, enqueued_at, origin
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(op.sequence as i64)
        .bind(&op.op_id)
        .bind(&op.endpoint)
        .bind(op.method.as_str())
        .bind(payload)
        .bind(op.attempts as i64)
        .bind(op.enqueued_at as i64)
        .bind(&op.origin)
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn load_all(&self) -> Result<Vec<QueuedOperation>> {
        let rows: Vec<StoredOperation> = sqlx::query_as(
            r#"
            SELECT sequence, op_id, endpoint, method, payload, attempts, enqueued_at, origin
            FROM operation_queue
            ORDER BY sequence ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredOperation::into_operation).collect()
    }

    async fn append_one(&self, op: &QueuedOperation) -> Result<()> {
        Self::insert(&self.pool, op).await
    }

    async fn update_one(&self, op: &QueuedOperation) -> Result<()> {
        let result = sqlx::query("UPDATE operation_queue SET attempts = ? WHERE sequence = ?")
            .bind(op.attempts as i64)
            .bind(op.sequence as i64)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::QueuePersistence(format!(
                "no queued operation with sequence {}",
                op.sequence
            )));
        }
        Ok(())
    }

    async fn remove_one(&self, sequence: Sequence) -> Result<()> {
        sqlx::query("DELETE FROM operation_queue WHERE sequence = ?")
            .bind(sequence as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_all(&self, ops: &[QueuedOperation]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM operation_queue")
            .execute(&mut *tx)
            .await?;
        for op in ops {
            Self::insert(&mut *tx, op).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::contract;

    async fn open_temp() -> (tempfile::TempDir, SqliteQueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteQueueStore::open(dir.path().join("queue.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn contract() {
        let (_dir, store) = open_temp().await;
        contract::append_update_remove(&store).await;

        let (_dir, store) = open_temp().await;
        contract::save_all_replaces(&store).await;

        let (_dir, store) = open_temp().await;
        contract::remove_missing_is_noop(&store).await;
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let ops = contract::sample(3);

        {
            let store = SqliteQueueStore::open(&path).await.unwrap();
            for op in &ops {
                store.append_one(op).await.unwrap();
            }
            store.pool.close().await;
        }

        let reopened = SqliteQueueStore::open(&path).await.unwrap();
        assert_eq!(reopened.load_all().await.unwrap(), ops);
    }

    #[tokio::test]
    async fn duplicate_op_id_rejected() {
        let (_dir, store) = open_temp().await;
        let op = contract::sample(1).remove(0);
        store.append_one(&op).await.unwrap();

        let mut clash = op.clone();
        clash.sequence = 99;
        assert!(matches!(
            store.append_one(&clash).await,
            Err(SyncError::QueuePersistence(_))
        ));
    }

    #[tokio::test]
    async fn update_missing_row_fails() {
        let (_dir, store) = open_temp().await;
        let op = contract::sample(1).remove(0);
        assert!(store.update_one(&op).await.is_err());
    }
}
