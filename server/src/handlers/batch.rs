//! Batch handler - applies an `update-lista` request to one collection.

use crate::db::{BatchRules, CollectionRegistry};
use crate::error::{AppError, Result};
use crate::Config;
use listsync_engine::{BatchCounts, BatchRequest};

/// Apply a batch to the collection at `path`.
///
/// All or nothing: a single invalid entry rejects the whole batch with every
/// problem found.
pub fn handle_batch(
    registry: &CollectionRegistry,
    config: &Config,
    path: &str,
    request: &BatchRequest,
) -> Result<BatchCounts> {
    let rules = BatchRules {
        id_field: &config.id_field,
        scope_keys: &config.scope_keys,
    };

    let counts = registry
        .apply_batch(path, request, &rules)
        .map_err(AppError::Validation)?;

    tracing::info!(
        collection = %path,
        created = counts.created,
        updated = counts.updated,
        removed = counts.removed,
        "Batch accepted"
    );
    Ok(counts)
}
