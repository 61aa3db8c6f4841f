//! # Listsync Client
//!
//! Async runtime around the listsync engine: submits collection batches over
//! HTTP, keeps transiently failed requests in a durable operation queue, and
//! replays that queue in order when connectivity returns.
//!
//! ## Components
//!
//! - [`BatchSyncClient`] saves one collection: diff, send, refresh.
//! - [`OperationQueue`] is the durable FIFO of undelivered requests, backed
//!   by a [`QueueStore`] (memory, JSON file or SQLite).
//! - [`QueueDrainer`] replays the queue oldest first and stops on the first
//!   transient failure.
//! - [`ConnectivityMonitor`] turns reachability reports into drain requests.
//! - [`SyncRuntime`] wires all of the above for one process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use listsync_client::{ClientConfig, StaticContext, SyncRuntime};
//! use listsync_engine::{CollectionEndpoint, LocalCollectionStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> listsync_client::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let context = Arc::new(StaticContext::new().with_token("secret"));
//! let runtime = SyncRuntime::start(config, context).await?;
//!
//! let endpoint = CollectionEndpoint::new("Os/pecas").with_scope("peca_os", 123);
//! let mut store = LocalCollectionStore::new();
//! store.replace_from_server(runtime.client().fetch(&endpoint).await?)?;
//!
//! let outcome = runtime.client().save(&endpoint, &mut store).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod drainer;
pub mod error;
pub mod inflight;
pub mod persist;
pub mod queue;
pub mod runtime;
pub mod transport;

pub use batch::{BatchSyncClient, SaveOutcome, SyncResult};
pub use config::{ClientConfig, ConfigError, QueueBackend};
pub use connectivity::{ConnectivityMonitor, DrainTrigger, Reachability};
pub use context::{ContextProvider, StaticContext};
pub use drainer::{DrainEvent, QueueDrainer, SyncStatus};
pub use error::{Result, SyncError};
pub use inflight::{InFlight, InFlightGuard};
pub use persist::{open_store, FileQueueStore, MemoryQueueStore, QueueStore, SqliteQueueStore};
pub use queue::OperationQueue;
pub use runtime::SyncRuntime;
pub use transport::{Delivery, HttpTransport, OutboundRequest, Transport};
