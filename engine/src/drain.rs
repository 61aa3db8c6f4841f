//! Drainer state machine.
//!
//! The queue drainer cycles through `Idle → Draining → (Idle | Blocked)`.
//! Transitions are pure here; the client runtime drives them from delivery
//! outcomes and publishes the resulting state.
//!
//! ```text
//!            trigger                 queue empty
//!   Idle ─────────────► Draining ─────────────────► Idle
//!    ▲                   │   ▲
//!    │                   │   │ trigger
//!    │       transient   ▼   │
//!    └──── (discard) ── Blocked
//! ```
//!
//! A rejected entry is dropped and draining continues; a transient failure
//! halts the cycle on that entry so nothing behind it is attempted.

use crate::{Classification, Sequence};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the drainer stopped short of an empty queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReason {
    /// Entry that could not be delivered, if one was attempted
    pub sequence: Option<Sequence>,
    pub reason: String,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence {
            Some(sequence) => write!(f, "operation {} blocked: {}", sequence, self.reason),
            None => write!(f, "blocked: {}", self.reason),
        }
    }
}

/// Drainer state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DrainState {
    #[default]
    Idle,
    Draining,
    Blocked(BlockReason),
}

/// What started a drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    ConnectivityRestored,
    AppResumed,
    ManualRetry,
}

/// What the drainer does with the oldest entry after one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStep {
    /// Acknowledged: remove and continue
    Advance,
    /// Permanently invalid: remove, report, continue
    Drop,
    /// Retry later: keep the entry and stop
    Halt,
}

impl From<Classification> for DrainStep {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Delivered => DrainStep::Advance,
            Classification::Rejected => DrainStep::Drop,
            Classification::Transient => DrainStep::Halt,
        }
    }
}

impl DrainState {
    pub fn is_draining(&self) -> bool {
        matches!(self, DrainState::Draining)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, DrainState::Blocked(_))
    }

    /// Start a cycle.
    ///
    /// Returns `None` when a cycle is already running; the trigger is
    /// coalesced into it.
    pub fn begin(&self) -> Option<DrainState> {
        match self {
            DrainState::Draining => None,
            DrainState::Idle | DrainState::Blocked(_) => Some(DrainState::Draining),
        }
    }

    /// State after a cycle ends.
    pub fn finish(blocked: Option<BlockReason>) -> DrainState {
        match blocked {
            Some(reason) => DrainState::Blocked(reason),
            None => DrainState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked() -> DrainState {
        DrainState::Blocked(BlockReason {
            sequence: Some(1),
            reason: "timeout".into(),
        })
    }

    #[test]
    fn begin_from_idle_and_blocked() {
        assert_eq!(DrainState::Idle.begin(), Some(DrainState::Draining));
        assert_eq!(blocked().begin(), Some(DrainState::Draining));
    }

    #[test]
    fn begin_while_draining_coalesces() {
        assert_eq!(DrainState::Draining.begin(), None);
    }

    #[test]
    fn finish_states() {
        assert_eq!(DrainState::finish(None), DrainState::Idle);
        assert!(DrainState::finish(Some(BlockReason {
            sequence: None,
            reason: "unreachable".into()
        }))
        .is_blocked());
    }

    #[test]
    fn steps_follow_classification() {
        assert_eq!(DrainStep::from(Classification::Delivered), DrainStep::Advance);
        assert_eq!(DrainStep::from(Classification::Rejected), DrainStep::Drop);
        assert_eq!(DrainStep::from(Classification::Transient), DrainStep::Halt);
    }

    #[test]
    fn block_reason_display() {
        let with_seq = BlockReason {
            sequence: Some(3),
            reason: "HTTP 503".into(),
        };
        assert_eq!(with_seq.to_string(), "operation 3 blocked: HTTP 503");

        let without = BlockReason {
            sequence: None,
            reason: "server unreachable".into(),
        };
        assert_eq!(without.to_string(), "blocked: server unreachable");
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_value(DrainState::Idle).unwrap();
        assert_eq!(json, serde_json::json!({"state": "idle"}));
    }
}
