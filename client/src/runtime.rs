//! SyncRuntime - wires the queue, transport, drainer and connectivity
//! monitor together for one application process.

use crate::batch::BatchSyncClient;
use crate::config::ClientConfig;
use crate::connectivity::{ConnectivityMonitor, DrainTrigger};
use crate::context::ContextProvider;
use crate::drainer::{DrainEvent, QueueDrainer, SyncStatus};
use crate::error::Result;
use crate::inflight::InFlight;
use crate::persist::open_store;
use crate::queue::OperationQueue;
use crate::transport::{HttpTransport, Transport};
use listsync_engine::{DrainState, Trigger};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Running sync machinery. Dropping it stops the background drainer.
pub struct SyncRuntime {
    queue: OperationQueue,
    client: BatchSyncClient,
    drainer: Arc<QueueDrainer>,
    monitor: Arc<ConnectivityMonitor>,
    drain_task: JoinHandle<()>,
}

impl SyncRuntime {
    /// Open the configured queue, connect the HTTP transport and start the
    /// drainer. Entries left over from a previous run are replayed at once.
    pub async fn start(config: ClientConfig, context: Arc<dyn ContextProvider>) -> Result<Self> {
        let store = open_store(&config.queue).await?;
        let queue = OperationQueue::open(store).await?;
        let transport = HttpTransport::new(config.base_url.clone(), config.timeout, context)?;

        tracing::info!(base_url = %config.base_url, queue = ?config.queue, "sync runtime starting");
        Ok(Self::assemble(queue, Arc::new(transport)).await)
    }

    /// Start over an already opened queue and any transport.
    pub async fn assemble(queue: OperationQueue, transport: Arc<dyn Transport>) -> Self {
        let inflight = InFlight::new();
        let trigger = DrainTrigger::new();
        let monitor = Arc::new(ConnectivityMonitor::new(trigger.clone()));

        let client = BatchSyncClient::new(transport.clone(), queue.clone(), inflight.clone())
            .with_reachability(monitor.reachability());
        let drainer = Arc::new(QueueDrainer::new(
            transport,
            queue.clone(),
            inflight,
            trigger.clone(),
        ));
        let drain_task = drainer.clone().spawn();

        if !queue.is_empty().await {
            trigger.request(Trigger::AppResumed);
        }

        Self {
            queue,
            client,
            drainer,
            monitor,
            drain_task,
        }
    }

    pub fn client(&self) -> &BatchSyncClient {
        &self.client
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Feed platform reachability reports here.
    pub fn connectivity(&self) -> Arc<ConnectivityMonitor> {
        self.monitor.clone()
    }

    pub fn drainer(&self) -> &QueueDrainer {
        &self.drainer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DrainEvent> {
        self.drainer.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<DrainState> {
        self.drainer.watch_state()
    }

    pub async fn status(&self) -> SyncStatus {
        self.drainer.status().await
    }

    /// User asked to retry pending operations.
    pub fn retry(&self) {
        self.drainer.retry();
    }

    pub fn app_resumed(&self) {
        self.monitor.app_resumed();
    }
}

impl Drop for SyncRuntime {
    fn drop(&mut self) {
        self.drain_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::SaveOutcome;
    use crate::persist::MemoryQueueStore;
    use crate::transport::mock::{ok, ScriptedTransport};
    use listsync_engine::{CollectionEndpoint, LocalCollectionStore, Method, NewOperation};
    use serde_json::json;

    async fn wait_idle_and_empty(runtime: &SyncRuntime) {
        let mut state = runtime.watch_state();
        loop {
            if matches!(*state.borrow_and_update(), DrainState::Idle)
                && runtime.queue().is_empty().await
            {
                return;
            }
            state.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn leftover_entries_replay_on_start() {
        let queue = OperationQueue::open(Arc::new(MemoryQueueStore::new()))
            .await
            .unwrap();
        queue
            .enqueue(NewOperation::new("left", "Os/pecas/update-lista/", Method::Post, json!({})))
            .await
            .unwrap();

        let transport = Arc::new(ScriptedTransport::new(ok(json!({}))));
        let runtime = SyncRuntime::assemble(queue, transport.clone()).await;

        wait_idle_and_empty(&runtime).await;
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn offline_save_replays_when_connectivity_returns() {
        let queue = OperationQueue::open(Arc::new(MemoryQueueStore::new()))
            .await
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new(ok(json!([]))));
        let runtime = SyncRuntime::assemble(queue, transport.clone()).await;

        runtime.connectivity().observe(false);
        let mut store = LocalCollectionStore::new();
        store
            .add(json!({"peca_prod": 7}).as_object().cloned().unwrap())
            .unwrap();
        let endpoint = CollectionEndpoint::new("Os/pecas").with_id_field("peca_item");

        let outcome = runtime.client().save(&endpoint, &mut store).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Queued { sequence: 1 });
        assert!(transport.sent().is_empty());
        assert_eq!(runtime.status().await.pending, 1);

        runtime.connectivity().observe(true);
        wait_idle_and_empty(&runtime).await;
        assert_eq!(transport.sent()[0].path, "Os/pecas/update-lista/");
        assert_eq!(runtime.status().await.pending, 0);
    }
}
