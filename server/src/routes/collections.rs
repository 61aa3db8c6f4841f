//! Collection endpoint routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use listsync_engine::{BatchCounts, BatchRequest, Fields};
use std::collections::HashMap;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_batch, handle_list};
use crate::AppState;

/// Create collection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{module}/{resource}/update-lista/", post(batch_handler))
        .route("/{module}/{resource}/", get(list_handler))
}

/// POST /{module}/{resource}/update-lista/ - Apply a batch.
async fn batch_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((module, resource)): Path<(String, String)>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchCounts>> {
    let path = format!("{}/{}", module, resource);
    let counts = handle_batch(&state.registry, &state.config, &path, &request)?;
    Ok(Json(counts))
}

/// GET /{module}/{resource}/ - List rows matching the query.
async fn list_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((module, resource)): Path<(String, String)>,
    Query(filters): Query<HashMap<String, String>>,
) -> Json<Vec<Fields>> {
    let path = format!("{}/{}", module, resource);
    Json(handle_list(&state.registry, &path, &filters))
}
