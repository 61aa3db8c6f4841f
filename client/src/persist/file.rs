//! JSON file queue storage.
//!
//! The whole queue is one [`QueueSnapshot`] document. Every change rewrites
//! it through a temp file in the same directory followed by a rename, so a
//! crash leaves either the old or the new document, never a torn one.

use super::QueueStore;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use listsync_engine::{QueueSnapshot, QueuedOperation, Sequence};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Queue stored as a single JSON document.
#[derive(Debug)]
pub struct FileQueueStore {
    path: PathBuf,
    /// Mirror of the document; updated only after a successful write
    entries: Mutex<BTreeMap<Sequence, QueuedOperation>>,
}

impl FileQueueStore {
    /// Open the document at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty queue.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(json) => QueueSnapshot::from_json(&json)?
                .operations
                .into_iter()
                .map(|op| (op.sequence, op))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened queue file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the mirror, persist it, then commit.
    async fn rewrite(
        &self,
        change: impl FnOnce(&mut BTreeMap<Sequence, QueuedOperation>),
    ) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        change(&mut next);

        let snapshot = QueueSnapshot::new(next.values().cloned().collect());
        let json = snapshot.to_json()?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, json.as_bytes()))
            .await
            .map_err(|e| SyncError::QueuePersistence(format!("queue writer panicked: {}", e)))??;

        *entries = next;
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        SyncError::QueuePersistence(format!(
            "failed to create temp file in {}: {}",
            dir.display(),
            e
        ))
    })?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        SyncError::QueuePersistence(format!(
            "failed to persist queue to {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(())
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load_all(&self) -> Result<Vec<QueuedOperation>> {
        Ok(self.entries.lock().await.values().cloned().collect())
    }

    async fn append_one(&self, op: &QueuedOperation) -> Result<()> {
        self.rewrite(|entries| {
            entries.insert(op.sequence, op.clone());
        })
        .await
    }

    async fn update_one(&self, op: &QueuedOperation) -> Result<()> {
        self.rewrite(|entries| {
            entries.insert(op.sequence, op.clone());
        })
        .await
    }

    async fn remove_one(&self, sequence: Sequence) -> Result<()> {
        self.rewrite(|entries| {
            entries.remove(&sequence);
        })
        .await
    }

    async fn save_all(&self, ops: &[QueuedOperation]) -> Result<()> {
        self.rewrite(|entries| {
            *entries = ops.iter().map(|op| (op.sequence, op.clone())).collect();
        })
        .await
    }
}
