//! Queued operations and the ordered queue log.
//!
//! The log is the in-memory half of the durable operation queue: it assigns
//! sequences and keeps entries in strict replay order. Persistence lives in
//! the client runtime, which writes an entry before committing it here.

use crate::{error::Result, Error, Sequence, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP verb of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::InvalidSnapshot(format!("unknown method: {}", other))),
        }
    }
}

/// A request handed to the queue, before it is assigned a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    /// Unique identity, used to discard the entry on user request
    pub op_id: String,
    pub endpoint: String,
    pub method: Method,
    pub payload: serde_json::Value,
    /// Key of the collection that produced the request, if any
    pub origin: Option<String>,
}

impl NewOperation {
    pub fn new(
        op_id: impl Into<String>,
        endpoint: impl Into<String>,
        method: Method,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            op_id: op_id.into(),
            endpoint: endpoint.into(),
            method,
            payload,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// A pending request that could not be delivered immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Replay order; strictly increasing in enqueue order
    pub sequence: Sequence,
    pub op_id: String,
    pub endpoint: String,
    pub method: Method,
    /// Serialized request body
    pub payload: serde_json::Value,
    /// Prior delivery attempts
    pub attempts: u32,
    /// Milliseconds since epoch
    pub enqueued_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// Ordered, append-only log of queued operations.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueLog {
    entries: BTreeMap<Sequence, QueuedOperation>,
    next_sequence: Sequence,
}

impl Default for QueueLog {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueLog {
    /// Create an empty log; the first sequence is 1.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_sequence: 1,
        }
    }

    /// Rebuild a log from persisted entries, in any order.
    ///
    /// New sequences continue after the highest loaded one.
    pub fn from_entries(entries: impl IntoIterator<Item = QueuedOperation>) -> Result<Self> {
        let mut log = Self::new();
        for op in entries {
            if log.entries.contains_key(&op.sequence) {
                return Err(Error::DuplicateSequence(op.sequence));
            }
            log.commit(op);
        }
        Ok(log)
    }

    /// Sequence the next enqueued operation will get.
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    /// Stamp a new operation with the next sequence, without recording it.
    ///
    /// The caller persists the result and then calls [`QueueLog::commit`].
    pub fn prepare(&self, op: NewOperation, now: Timestamp) -> QueuedOperation {
        QueuedOperation {
            sequence: self.next_sequence,
            op_id: op.op_id,
            endpoint: op.endpoint,
            method: op.method,
            payload: op.payload,
            attempts: 0,
            enqueued_at: now,
            origin: op.origin,
        }
    }

    /// Record an operation.
    pub fn commit(&mut self, op: QueuedOperation) {
        self.next_sequence = self.next_sequence.max(op.sequence + 1);
        self.entries.insert(op.sequence, op);
    }

    /// Operation with the lowest sequence.
    pub fn oldest(&self) -> Option<&QueuedOperation> {
        self.entries.values().next()
    }

    pub fn get(&self, sequence: Sequence) -> Option<&QueuedOperation> {
        self.entries.get(&sequence)
    }

    pub fn remove(&mut self, sequence: Sequence) -> Option<QueuedOperation> {
        self.entries.remove(&sequence)
    }

    /// The entry as it would look after one more failed attempt.
    pub fn with_attempt(&self, sequence: Sequence) -> Option<QueuedOperation> {
        self.entries.get(&sequence).map(|op| QueuedOperation {
            attempts: op.attempts.saturating_add(1),
            ..op.clone()
        })
    }

    /// Replace an entry in place, keeping its sequence.
    ///
    /// Only the attempt counter ever changes after enqueue.
    pub fn update(&mut self, op: QueuedOperation) -> bool {
        match self.entries.get_mut(&op.sequence) {
            Some(existing) => {
                existing.attempts = op.attempts;
                true
            }
            None => false,
        }
    }

    /// Entries in replay order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedOperation> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<QueuedOperation> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence of the entry with this operation id.
    pub fn find_op(&self, op_id: &str) -> Option<Sequence> {
        self.entries
            .values()
            .find(|op| op.op_id == op_id)
            .map(|op| op.sequence)
    }

    /// Sequences of every entry produced by a collection, in replay order.
    pub fn sequences_for_origin(&self, origin: &str) -> Vec<Sequence> {
        self.entries
            .values()
            .filter(|op| op.origin.as_deref() == Some(origin))
            .map(|op| op.sequence)
            .collect()
    }
}
