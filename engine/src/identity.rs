//! Local identity allocation.
//!
//! Items created on the client need a stable handle before the server has
//! assigned them a permanent identifier. The allocator hands out strictly
//! increasing integers for the lifetime of one collection store.

use crate::LocalId;
use serde::{Deserialize, Serialize};

/// Issues strictly increasing local identifiers, starting at 1.
///
/// Identifiers are never reused and never leave the process: they are not
/// persisted and are meaningless across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAllocator {
    /// Last identifier handed out (0 before the first call)
    last: LocalId,
}

impl IdentityAllocator {
    /// Create an allocator whose first identifier will be 1.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Allocate the next identifier.
    pub fn next(&mut self) -> LocalId {
        self.last += 1;
        self.last
    }

    /// The most recently issued identifier, or 0 if none was issued yet.
    pub fn last(&self) -> LocalId {
        self.last
    }
}
