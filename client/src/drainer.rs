//! QueueDrainer - replays queued operations, oldest first.
//!
//! One cycle walks the queue from the front. An acknowledged entry is
//! removed and the walk continues; a rejected entry is removed and reported;
//! a transient failure stops the cycle on that entry, so nothing behind it
//! overtakes it. Only one cycle runs at a time.

use crate::connectivity::DrainTrigger;
use crate::inflight::{InFlight, InFlightGuard};
use crate::queue::OperationQueue;
use crate::transport::{Delivery, OutboundRequest, Transport};
use listsync_engine::{BlockReason, DrainState, DrainStep, QueuedOperation, Sequence, Trigger};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// How long a cycle waits for a collection's own save to finish.
const BUSY_WAIT: Duration = Duration::from_secs(2);
const BUSY_POLL: Duration = Duration::from_millis(25);

/// Reported to observers as the drainer works.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DrainEvent {
    Delivered {
        sequence: Sequence,
        op_id: String,
    },
    /// Permanently rejected and removed; the user has to re-enter it
    Dropped {
        sequence: Sequence,
        op_id: String,
        origin: Option<String>,
        status: u16,
        details: Vec<String>,
    },
    Blocked(BlockReason),
}

/// Aggregate status for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: DrainState,
    /// "N operations pending"
    pub pending: usize,
    /// "last sync failed, will retry"
    pub last_sync_failed: bool,
}

/// Replays the operation queue in strict FIFO order.
pub struct QueueDrainer {
    transport: Arc<dyn Transport>,
    queue: OperationQueue,
    inflight: InFlight,
    trigger: DrainTrigger,
    state: watch::Sender<DrainState>,
    events: broadcast::Sender<DrainEvent>,
}

impl QueueDrainer {
    pub fn new(
        transport: Arc<dyn Transport>,
        queue: OperationQueue,
        inflight: InFlight,
        trigger: DrainTrigger,
    ) -> Self {
        let (state, _) = watch::channel(DrainState::Idle);
        let (events, _) = broadcast::channel(64);
        Self {
            transport,
            queue,
            inflight,
            trigger,
            state,
            events,
        }
    }

    /// Observe state changes.
    pub fn watch_state(&self) -> watch::Receiver<DrainState> {
        self.state.subscribe()
    }

    /// Observe deliveries, drops and blocks.
    pub fn subscribe(&self) -> broadcast::Receiver<DrainEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> DrainState {
        self.state.borrow().clone()
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state();
        SyncStatus {
            last_sync_failed: state.is_blocked(),
            pending: self.queue.len().await,
            state,
        }
    }

    /// Ask for a cycle on behalf of the user.
    pub fn retry(&self) {
        self.trigger.request(Trigger::ManualRetry);
    }

    /// Run one drain cycle and return the state it ended in.
    ///
    /// If a cycle is already running this returns `Draining` at once; the
    /// running cycle will see any entries added meanwhile.
    pub async fn drain(&self) -> DrainState {
        let started = self.state.send_if_modified(|state| match state.begin() {
            Some(next) => {
                *state = next;
                true
            }
            None => false,
        });
        if !started {
            tracing::debug!("drain already running, request coalesced");
            return DrainState::Draining;
        }

        let blocked = self.cycle().await;
        if let Some(reason) = &blocked {
            tracing::warn!(sequence = ?reason.sequence, reason = %reason.reason, "queue drain blocked");
            let _ = self.events.send(DrainEvent::Blocked(reason.clone()));
        }

        let end = DrainState::finish(blocked);
        self.state.send_replace(end.clone());
        end
    }

    async fn cycle(&self) -> Option<BlockReason> {
        if self.queue.is_empty().await {
            return None;
        }
        if !self.transport.probe().await {
            return Some(BlockReason {
                sequence: None,
                reason: "server unreachable".into(),
            });
        }

        let mut delivered = 0usize;
        while let Some(op) = self.queue.peek_oldest().await {
            let _guard = match &op.origin {
                Some(origin) => match self.claim(origin).await {
                    Some(guard) => Some(guard),
                    None => return Some(blocked_on(&op, "collection busy")),
                },
                None => None,
            };

            let request = OutboundRequest::new(op.method, op.endpoint.clone(), op.payload.clone());
            let delivery = self.transport.send(&request).await;

            match DrainStep::from(delivery.classification()) {
                DrainStep::Advance => {
                    if let Err(e) = self.queue.remove(op.sequence).await {
                        return Some(blocked_on(&op, &format!("delivered but not removed: {}", e)));
                    }
                    delivered += 1;
                    tracing::debug!(sequence = op.sequence, "queued operation delivered");
                    let _ = self.events.send(DrainEvent::Delivered {
                        sequence: op.sequence,
                        op_id: op.op_id.clone(),
                    });
                }
                DrainStep::Drop => {
                    if let Err(e) = self.queue.remove(op.sequence).await {
                        return Some(blocked_on(&op, &format!("rejected but not removed: {}", e)));
                    }
                    let (status, details) = match delivery {
                        Delivery::Rejected { status, details } => (status, details),
                        _ => (0, Vec::new()),
                    };
                    tracing::warn!(
                        sequence = op.sequence,
                        status,
                        ?details,
                        "queued operation rejected and dropped"
                    );
                    let _ = self.events.send(DrainEvent::Dropped {
                        sequence: op.sequence,
                        op_id: op.op_id.clone(),
                        origin: op.origin.clone(),
                        status,
                        details,
                    });
                }
                DrainStep::Halt => {
                    let reason = match delivery {
                        Delivery::Transient { reason } => reason,
                        _ => "transient failure".to_string(),
                    };
                    match self.queue.record_attempt(op.sequence).await {
                        Ok(attempts) => {
                            tracing::debug!(sequence = op.sequence, attempts, "attempt recorded")
                        }
                        Err(e) => tracing::warn!(sequence = op.sequence, "failed to record attempt: {}", e),
                    }
                    return Some(blocked_on(&op, &reason));
                }
            }
        }

        tracing::info!(delivered, "operation queue drained");
        None
    }

    /// Wait briefly for a collection's own save to settle.
    async fn claim(&self, origin: &str) -> Option<InFlightGuard> {
        let deadline = tokio::time::Instant::now() + BUSY_WAIT;
        loop {
            if let Some(guard) = self.inflight.try_acquire(origin) {
                return Some(guard);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(BUSY_POLL).await;
        }
    }

    /// Drain whenever triggered, for the life of the process.
    ///
    /// Requests that arrive while a cycle ends blocked are dropped; the
    /// blocked entry waits for the next trigger.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.trigger.wait().await;
            if self.drain().await.is_blocked() && self.trigger.discard_pending() {
                tracing::debug!("dropped drain request raised during blocked cycle");
            }
        }
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

fn blocked_on(op: &QueuedOperation, reason: &str) -> BlockReason {
    BlockReason {
        sequence: Some(op.sequence),
        reason: reason.to_string(),
    }
}
