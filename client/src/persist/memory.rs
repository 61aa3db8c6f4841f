//! In-memory queue storage, for tests and ephemeral sessions.

use super::QueueStore;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use listsync_engine::{QueuedOperation, Sequence};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Keeps entries in a map; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    entries: Mutex<BTreeMap<Sequence, QueuedOperation>>,
    fail_writes: AtomicBool,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as a full disk would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn write<T>(&self, f: impl FnOnce(&mut BTreeMap<Sequence, QueuedOperation>) -> T) -> Result<T> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::QueuePersistence("write refused".into()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::QueuePersistence("queue store poisoned".into()))?;
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load_all(&self) -> Result<Vec<QueuedOperation>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::QueuePersistence("queue store poisoned".into()))?;
        Ok(entries.values().cloned().collect())
    }

    async fn append_one(&self, op: &QueuedOperation) -> Result<()> {
        self.write(|entries| {
            entries.insert(op.sequence, op.clone());
        })
    }

    async fn update_one(&self, op: &QueuedOperation) -> Result<()> {
        self.write(|entries| {
            entries.insert(op.sequence, op.clone());
        })
    }

    async fn remove_one(&self, sequence: Sequence) -> Result<()> {
        self.write(|entries| {
            entries.remove(&sequence);
        })
    }

    async fn save_all(&self, ops: &[QueuedOperation]) -> Result<()> {
        self.write(|entries| {
            *entries = ops.iter().map(|op| (op.sequence, op.clone())).collect();
        })
    }
}
