//! Snapshot types for persisting and restoring the operation queue.
//!
//! File-backed queues write one snapshot per change. Operations are kept in
//! sequence order so the same queue always serializes to the same bytes.

use crate::{error::Result, Error, QueueLog, QueuedOperation};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format for future compatibility.
pub const QUEUE_SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Durable image of the operation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Pending operations in replay order
    pub operations: Vec<QueuedOperation>,
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl QueueSnapshot {
    /// Create a snapshot from operations in any order.
    pub fn new(mut operations: Vec<QueuedOperation>) -> Self {
        operations.sort_by_key(|op| op.sequence);
        Self {
            format_version: QUEUE_SNAPSHOT_FORMAT_VERSION,
            operations,
        }
    }

    /// Capture a queue log.
    pub fn from_log(log: &QueueLog) -> Self {
        Self {
            format_version: QUEUE_SNAPSHOT_FORMAT_VERSION,
            operations: log.to_vec(),
        }
    }

    /// Rebuild the queue log.
    pub fn into_log(self) -> Result<QueueLog> {
        QueueLog::from_entries(self.operations)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > QUEUE_SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, QUEUE_SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}
