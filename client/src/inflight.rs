//! Single-flight guard per collection.
//!
//! At most one request per collection key is on the wire at any time,
//! whether it comes from a save or from queue replay.

use dashmap::DashSet;
use std::sync::Arc;

/// Set of collection keys with a request in flight.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<DashSet<String>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a key. Returns `None` if it is already claimed.
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        if self.keys.insert(key.to_string()) {
            Some(InFlightGuard {
                keys: self.keys.clone(),
                key: key.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<DashSet<String>>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}
