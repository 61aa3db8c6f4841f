//! Durable storage for the operation queue.
//!
//! The queue writes through a [`QueueStore`] before it changes its in-memory
//! log, so an entry reported as enqueued survives a restart.

mod file;
mod memory;
mod sqlite;

pub use file::FileQueueStore;
pub use memory::MemoryQueueStore;
pub use sqlite::SqliteQueueStore;

use crate::config::QueueBackend;
use crate::error::Result;
use async_trait::async_trait;
use listsync_engine::{QueuedOperation, Sequence};
use std::sync::Arc;

/// Storage backend for queued operations.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Every persisted entry, in any order.
    async fn load_all(&self) -> Result<Vec<QueuedOperation>>;

    async fn append_one(&self, op: &QueuedOperation) -> Result<()>;

    /// Overwrite an existing entry (attempt counter).
    async fn update_one(&self, op: &QueuedOperation) -> Result<()>;

    async fn remove_one(&self, sequence: Sequence) -> Result<()>;

    /// Replace the whole queue.
    async fn save_all(&self, ops: &[QueuedOperation]) -> Result<()>;
}

/// Open the backend named by the configuration.
pub async fn open_store(backend: &QueueBackend) -> Result<Arc<dyn QueueStore>> {
    let store: Arc<dyn QueueStore> = match backend {
        QueueBackend::Memory => Arc::new(MemoryQueueStore::new()),
        QueueBackend::File(path) => Arc::new(FileQueueStore::open(path).await?),
        QueueBackend::Sqlite(path) => Arc::new(SqliteQueueStore::open(path).await?),
    };
    Ok(store)
}
