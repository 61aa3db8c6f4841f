//! ConnectivityMonitor - turns reachability transitions into drain signals.
//!
//! The platform layer reports whether the device believes it is online. An
//! offline-to-online transition wakes the drainer; repeated reports of the
//! same state do nothing.

use futures::{FutureExt, Stream, StreamExt};
use listsync_engine::Trigger;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// Wakes the queue drainer. Requests made while a wake-up is pending are
/// coalesced into it.
#[derive(Debug, Clone, Default)]
pub struct DrainTrigger {
    notify: Arc<Notify>,
}

impl DrainTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a drain cycle.
    pub fn request(&self, trigger: Trigger) {
        tracing::debug!(?trigger, "drain requested");
        self.notify.notify_one();
    }

    /// Wait for the next request.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Drop a request stored while nobody was waiting. Returns whether one
    /// was pending.
    pub fn discard_pending(&self) -> bool {
        self.notify.notified().now_or_never().is_some()
    }
}

/// Read-only view of the last reported reachability.
#[derive(Debug, Clone)]
pub struct Reachability {
    rx: watch::Receiver<bool>,
}

impl Reachability {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the reported state changes.
    pub async fn changed(&mut self) -> bool {
        if self.rx.changed().await.is_err() {
            return self.is_online();
        }
        *self.rx.borrow_and_update()
    }
}

/// Tracks reachability and signals the drainer when it comes back.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
    trigger: DrainTrigger,
}

impl ConnectivityMonitor {
    /// Start assuming the device is online.
    pub fn new(trigger: DrainTrigger) -> Self {
        Self::with_initial(trigger, true)
    }

    pub fn with_initial(trigger: DrainTrigger, online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx, trigger }
    }

    pub fn reachability(&self) -> Reachability {
        Reachability {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a reachability report. Returns `true` if it restored
    /// connectivity and a drain was requested.
    pub fn observe(&self, online: bool) -> bool {
        let was_online = self.tx.send_replace(online);
        if was_online == online {
            return false;
        }

        if online {
            tracing::info!("connectivity restored");
            self.trigger.request(Trigger::ConnectivityRestored);
            true
        } else {
            tracing::info!("connectivity lost");
            false
        }
    }

    /// The application returned to the foreground.
    pub fn app_resumed(&self) {
        if self.is_online() {
            self.trigger.request(Trigger::AppResumed);
        }
    }

    /// Follow a platform stream of reachability reports until it ends.
    pub async fn run<S>(&self, reports: S)
    where
        S: Stream<Item = bool>,
    {
        futures::pin_mut!(reports);
        while let Some(online) = reports.next().await {
            self.observe(online);
        }
        tracing::debug!("reachability stream ended");
    }
}
