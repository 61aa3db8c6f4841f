//! List handler - serves the authoritative rows of a collection.

use crate::db::CollectionRegistry;
use listsync_engine::Fields;
use std::collections::HashMap;

/// Rows of the collection at `path` matching every query parameter.
pub fn handle_list(
    registry: &CollectionRegistry,
    path: &str,
    filters: &HashMap<String, String>,
) -> Vec<Fields> {
    let rows = registry.list(path, filters);
    tracing::debug!(collection = %path, rows = rows.len(), "Collection listed");
    rows
}
