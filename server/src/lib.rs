//! Listsync Server - reference backend for batch-synchronized collections.
//!
//! Serves the two endpoints every listsync collection relies on: the
//! `update-lista` batch endpoint and the authoritative listing. Collections
//! live in memory and are created on first write.

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod routes;

pub use crate::config::{Config, ConfigError};
pub use crate::db::CollectionRegistry;
pub use crate::error::AppError;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CollectionRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            registry: CollectionRegistry::new_shared(),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
