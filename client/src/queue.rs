//! OperationQueue - the process-wide, durable FIFO of undelivered requests.
//!
//! Every read-modify-persist sequence runs under one async mutex, and the
//! backend is written before the in-memory log changes. An entry the caller
//! was told is queued is therefore on disk, and a failed write leaves both
//! sides as they were.

use crate::error::{Result, SyncError};
use crate::persist::QueueStore;
use listsync_engine::{NewOperation, QueueLog, QueuedOperation, Sequence};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

static GLOBAL: OnceLock<OperationQueue> = OnceLock::new();

/// Durable, ordered queue of pending requests.
#[derive(Clone)]
pub struct OperationQueue {
    log: Arc<Mutex<QueueLog>>,
    store: Arc<dyn QueueStore>,
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue").finish_non_exhaustive()
    }
}

impl OperationQueue {
    /// Load every persisted entry and start from there.
    pub async fn open(store: Arc<dyn QueueStore>) -> Result<Self> {
        let entries = store.load_all().await?;
        let log = QueueLog::from_entries(entries)?;
        tracing::info!(pending = log.len(), "operation queue loaded");
        Ok(Self {
            log: Arc::new(Mutex::new(log)),
            store,
        })
    }

    /// Install the process-wide queue. Later calls keep the first one.
    pub fn init_global(queue: OperationQueue) -> &'static OperationQueue {
        GLOBAL.get_or_init(|| queue)
    }

    /// The process-wide queue, if initialized.
    pub fn global() -> Option<&'static OperationQueue> {
        GLOBAL.get()
    }

    /// Append an operation and return its sequence.
    ///
    /// Fails with `QueuePersistence` if the entry could not be made durable;
    /// nothing is queued in that case.
    pub async fn enqueue(&self, op: NewOperation) -> Result<Sequence> {
        let mut log = self.log.lock().await;
        let entry = log.prepare(op, now_millis());
        self.store.append_one(&entry).await?;

        let sequence = entry.sequence;
        tracing::info!(
            sequence,
            endpoint = %entry.endpoint,
            origin = entry.origin.as_deref().unwrap_or(""),
            "operation queued"
        );
        log.commit(entry);
        Ok(sequence)
    }

    /// The entry with the lowest sequence.
    pub async fn peek_oldest(&self) -> Option<QueuedOperation> {
        self.log.lock().await.oldest().cloned()
    }

    /// Remove an acknowledged entry.
    ///
    /// Only the oldest entry may be removed this way; anything else would
    /// reorder the queue. An entry that is already gone (discarded while it
    /// was being delivered) counts as removed.
    pub async fn remove(&self, sequence: Sequence) -> Result<()> {
        let mut log = self.log.lock().await;
        if log.get(sequence).is_none() {
            tracing::debug!(sequence, "operation already removed");
            return Ok(());
        }
        match log.oldest() {
            Some(oldest) if oldest.sequence == sequence => {}
            Some(oldest) => {
                return Err(SyncError::QueuePersistence(format!(
                    "refusing to remove {} ahead of oldest {}",
                    sequence, oldest.sequence
                )))
            }
            None => return Ok(()),
        }

        self.store.remove_one(sequence).await?;
        log.remove(sequence);
        tracing::debug!(sequence, remaining = log.len(), "operation removed");
        Ok(())
    }

    /// Count one more failed delivery of an entry. Returns the new count.
    pub async fn record_attempt(&self, sequence: Sequence) -> Result<u32> {
        let mut log = self.log.lock().await;
        let Some(bumped) = log.with_attempt(sequence) else {
            return Ok(0);
        };
        self.store.update_one(&bumped).await?;
        let attempts = bumped.attempts;
        log.update(bumped);
        Ok(attempts)
    }

    /// Drop an entry by identity, on explicit user request.
    ///
    /// Returns `false` if no entry has that id.
    pub async fn discard(&self, op_id: &str) -> Result<bool> {
        let mut log = self.log.lock().await;
        let Some(sequence) = log.find_op(op_id) else {
            return Ok(false);
        };
        self.store.remove_one(sequence).await?;
        log.remove(sequence);
        tracing::info!(sequence, op_id, "queued operation discarded");
        Ok(true)
    }

    /// Drop every entry produced by a collection, on explicit user request.
    ///
    /// Returns how many were dropped.
    pub async fn discard_origin(&self, origin: &str) -> Result<usize> {
        let mut log = self.log.lock().await;
        let sequences = log.sequences_for_origin(origin);
        if sequences.is_empty() {
            return Ok(0);
        }

        let mut remaining = log.clone();
        for sequence in &sequences {
            remaining.remove(*sequence);
        }
        self.store.save_all(&remaining.to_vec()).await?;
        *log = remaining;

        tracing::info!(origin, count = sequences.len(), "queued operations discarded");
        Ok(sequences.len())
    }

    /// Drop every pending entry, on explicit user request.
    ///
    /// Returns how many were dropped.
    pub async fn clear(&self) -> Result<usize> {
        let mut log = self.log.lock().await;
        let count = log.len();
        if count == 0 {
            return Ok(0);
        }

        self.store.save_all(&[]).await?;
        let mut emptied = log.clone();
        for op in log.iter() {
            emptied.remove(op.sequence);
        }
        *log = emptied;

        tracing::info!(count, "operation queue cleared");
        Ok(count)
    }

    /// Every entry, in replay order.
    pub async fn all(&self) -> Vec<QueuedOperation> {
        self.log.lock().await.to_vec()
    }

    pub async fn len(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.lock().await.is_empty()
    }

    /// Whether any entry came from this collection.
    pub async fn has_origin(&self, origin: &str) -> bool {
        self.log
            .lock()
            .await
            .iter()
            .any(|op| op.origin.as_deref() == Some(origin))
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
