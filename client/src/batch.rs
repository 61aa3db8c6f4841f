//! BatchSyncClient - submits a collection's batch and reconciles the result.
//!
//! `save` is the whole flow behind a save button: diff the store, send the
//! batch, re-read the authoritative list on success, and hand the exact
//! request to the operation queue when the failure is transient.

use crate::connectivity::Reachability;
use crate::error::{Result, SyncError};
use crate::inflight::{InFlight, InFlightGuard};
use crate::queue::OperationQueue;
use crate::transport::{Delivery, OutboundRequest, Transport};
use listsync_engine::{
    counts_from_response, BatchCounts, CollectionEndpoint, DiffBatch, LocalCollectionStore,
    Method, NewOperation, Sequence, ServerRecord,
};
use std::sync::Arc;

/// Acknowledged batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub counts: BatchCounts,
    /// Raw response body, if the server sent JSON
    pub body: Option<serde_json::Value>,
}

/// What `save` did with the collection's changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The store had no pending changes
    NothingToSave,
    /// Acknowledged by the server. `refreshed` is false if the follow-up
    /// read failed and the store still holds the pre-save state.
    Synced {
        counts: BatchCounts,
        refreshed: bool,
    },
    /// Kept in the operation queue for later replay
    Queued { sequence: Sequence },
}

/// Result of the network half of a save, produced by a detached task.
enum Submission {
    Delivered(Option<serde_json::Value>),
    Queued(Sequence),
}

/// Sends collection batches and falls back to the operation queue.
#[derive(Clone)]
pub struct BatchSyncClient {
    transport: Arc<dyn Transport>,
    queue: OperationQueue,
    inflight: InFlight,
    reachability: Option<Reachability>,
}

impl BatchSyncClient {
    pub fn new(transport: Arc<dyn Transport>, queue: OperationQueue, inflight: InFlight) -> Self {
        Self {
            transport,
            queue,
            inflight,
            reachability: None,
        }
    }

    /// Skip the network while the device reports itself offline.
    pub fn with_reachability(mut self, reachability: Reachability) -> Self {
        self.reachability = Some(reachability);
        self
    }

    fn known_offline(&self) -> bool {
        self.reachability
            .as_ref()
            .map(|r| !r.is_online())
            .unwrap_or(false)
    }

    fn acquire(&self, endpoint: &CollectionEndpoint) -> Result<InFlightGuard> {
        let key = endpoint.key();
        self.inflight
            .try_acquire(&key)
            .ok_or(SyncError::SubmissionInFlight(key))
    }

    /// Send one batch, without queueing.
    ///
    /// A transient failure is returned as `SyncError::Transient`; the caller
    /// decides whether to enqueue.
    pub async fn submit(
        &self,
        endpoint: &CollectionEndpoint,
        batch: &DiffBatch,
    ) -> Result<SyncResult> {
        let _guard = self.acquire(endpoint)?;
        let request = OutboundRequest::new(
            Method::Post,
            endpoint.batch_path(),
            endpoint.build_request(batch).to_payload(),
        );

        match self.transport.send(&request).await {
            Delivery::Delivered { body, .. } => Ok(SyncResult {
                counts: counts_from_response(body.as_ref(), batch.counts()),
                body,
            }),
            Delivery::Rejected { status, details } => {
                Err(SyncError::ValidationRejected { status, details })
            }
            Delivery::Transient { reason } => Err(SyncError::Transient(reason)),
        }
    }

    /// Read the authoritative list of a collection.
    pub async fn fetch(&self, endpoint: &CollectionEndpoint) -> Result<Vec<ServerRecord>> {
        let request = OutboundRequest::get(endpoint.list_path(), endpoint.query());
        match self.transport.send(&request).await {
            Delivery::Delivered {
                body: Some(body), ..
            } => Ok(endpoint.parse_records(&body)?),
            Delivery::Delivered { body: None, status } => Err(SyncError::InvalidResponse(
                format!("HTTP {} listing without a JSON body", status),
            )),
            Delivery::Rejected { status, details } => {
                Err(SyncError::ValidationRejected { status, details })
            }
            Delivery::Transient { reason } => Err(SyncError::Transient(reason)),
        }
    }

    /// Save a collection's pending changes.
    ///
    /// Returns `ValidationRejected` when the server refuses the batch; the
    /// store is left as it was so the user can fix the input. Transient
    /// failures never escape: the request is queued and `Queued` returned.
    /// After `Queued` the store still holds the unsent changes.
    ///
    /// The network call runs in its own task, so dropping this future (the
    /// screen went away) does not lose a transient failure.
    pub async fn save(
        &self,
        endpoint: &CollectionEndpoint,
        store: &mut LocalCollectionStore,
    ) -> Result<SaveOutcome> {
        let batch = store.compute_batch();
        if batch.is_empty() {
            return Ok(SaveOutcome::NothingToSave);
        }

        let key = endpoint.key();
        let op = NewOperation::new(
            uuid::Uuid::new_v4().to_string(),
            endpoint.batch_path(),
            Method::Post,
            endpoint.build_request(&batch).to_payload(),
        )
        .with_origin(key.clone());

        // Later saves wait behind earlier queued ones of the same collection,
        // even while the drainer holds it
        if self.known_offline() || self.queue.has_origin(&key).await {
            let sequence = self.queue.enqueue(op).await?;
            tracing::info!(collection = %key, sequence, "save queued behind pending operations");
            return Ok(SaveOutcome::Queued { sequence });
        }

        let guard = self.acquire(endpoint)?;

        let task = tokio::spawn(deliver_or_enqueue(
            self.transport.clone(),
            self.queue.clone(),
            op,
            guard,
        ));
        let (submission, guard) = task
            .await
            .map_err(|e| SyncError::Transient(format!("submission task failed: {}", e)))?;

        match submission? {
            Submission::Queued(sequence) => Ok(SaveOutcome::Queued { sequence }),
            Submission::Delivered(body) => {
                let counts = counts_from_response(body.as_ref(), batch.counts());
                let refreshed = match self.fetch(endpoint).await {
                    Ok(records) => match store.replace_from_server(records) {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!(collection = %key, "refresh rejected: {}", e);
                            false
                        }
                    },
                    Err(e) => {
                        tracing::warn!(collection = %key, "refresh after save failed: {}", e);
                        false
                    }
                };
                drop(guard);

                tracing::info!(
                    collection = %key,
                    created = counts.created,
                    updated = counts.updated,
                    removed = counts.removed,
                    refreshed,
                    "collection saved"
                );
                Ok(SaveOutcome::Synced { counts, refreshed })
            }
        }
    }
}

/// Send a batch; queue it if the failure is transient.
///
/// Runs detached from the caller. The guard travels with the request so the
/// collection stays busy until the outcome is settled.
async fn deliver_or_enqueue(
    transport: Arc<dyn Transport>,
    queue: OperationQueue,
    op: NewOperation,
    guard: InFlightGuard,
) -> (Result<Submission>, InFlightGuard) {
    let request = OutboundRequest::new(op.method, op.endpoint.clone(), op.payload.clone());

    let result = match transport.send(&request).await {
        Delivery::Delivered { body, .. } => Ok(Submission::Delivered(body)),
        Delivery::Rejected { status, details } => {
            tracing::warn!(collection = %guard.key(), status, ?details, "batch rejected");
            Err(SyncError::ValidationRejected { status, details })
        }
        Delivery::Transient { reason } => {
            tracing::warn!(collection = %guard.key(), %reason, "batch failed, queueing");
            queue.enqueue(op).await.map(Submission::Queued)
        }
    };
    (result, guard)
}
