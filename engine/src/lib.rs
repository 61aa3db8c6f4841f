//! # Listsync Engine
//!
//! A deterministic reconciliation engine for offline-resilient editing of
//! server-backed collections (line items of an order, parts of a service
//! order, ...).
//!
//! This crate holds the core logic: local collection state, batch diffing,
//! the batch wire format, failure classification, and the ordered queue log
//! replayed when connectivity returns. It performs no I/O.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **Deterministic**: The same collection always produces the same batch
//! - **Testable**: Pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Line items
//!
//! A [`LineItem`] has a local id issued by the [`IdentityAllocator`], an
//! optional [`ServerId`] once persisted, opaque [`Fields`], and a tombstone
//! flag marking a persisted item pending deletion.
//!
//! ### Collection store
//!
//! [`LocalCollectionStore`] is the editable, ordered collection. Mutations
//! stay local until the caller saves.
//!
//! ### Diffing
//!
//! [`compute_batch`] partitions a snapshot into create/update/delete lists,
//! and a [`CollectionEndpoint`] turns that into the `update-lista` body with
//! the collection's scoping keys.
//!
//! ### Queue
//!
//! [`QueueLog`] keeps undelivered requests in sequence order. The drainer
//! state machine ([`DrainState`]) decides what happens after each replay
//! attempt, based on [`classify_status`].
//!
//! ## Quick Start
//!
//! ```rust
//! use listsync_engine::{CollectionEndpoint, LocalCollectionStore, ServerRecord};
//! use serde_json::json;
//!
//! let mut store = LocalCollectionStore::new();
//! store
//!     .replace_from_server(vec![ServerRecord::new(
//!         10,
//!         json!({"peca_prod": 1, "peca_quan": 2}).as_object().cloned().unwrap(),
//!     )])
//!     .unwrap();
//!
//! store
//!     .add(json!({"peca_prod": 7, "peca_quan": 1}).as_object().cloned().unwrap())
//!     .unwrap();
//!
//! let batch = store.compute_batch();
//! assert_eq!(batch.create.len(), 1);
//! assert_eq!(batch.update.len(), 1);
//!
//! let endpoint = CollectionEndpoint::new("Os/pecas").with_scope("peca_os", 123);
//! let request = endpoint.build_request(&batch);
//! assert_eq!(request.adicionar[0]["peca_os"], 123);
//! ```
//!
//! ## Persistence
//!
//! The engine never persists anything. The client runtime stores queue
//! entries, either row by row or as a [`QueueSnapshot`] document.

pub mod classify;
pub mod diff;
pub mod drain;
pub mod error;
pub mod identity;
pub mod item;
pub mod queue;
pub mod snapshot;
pub mod store;
pub mod wire;

// Re-export main types at crate root
pub use classify::{classify_status, is_auth_failure, rejection_messages, Classification};
pub use diff::{compute_batch, BatchCounts, DiffBatch, UpdateEntry};
pub use drain::{BlockReason, DrainState, DrainStep, Trigger};
pub use error::Error;
pub use identity::IdentityAllocator;
pub use item::{Fields, LineItem, ServerId, ServerRecord};
pub use queue::{Method, NewOperation, QueueLog, QueuedOperation};
pub use snapshot::{QueueSnapshot, QUEUE_SNAPSHOT_FORMAT_VERSION};
pub use store::{LocalCollectionStore, Removal, Validator};
pub use wire::{counts_from_response, BatchRequest, CollectionEndpoint, DEFAULT_ID_FIELD};

/// Type aliases for clarity
pub type LocalId = u64;
pub type Sequence = u64;
pub type Timestamp = u64;
