//! In-memory collection tables.
//!
//! Each collection path (`Os/pecas`) owns an ordered table of integer id to
//! record. A batch is validated in full before anything is applied, and is
//! applied while holding the table's shard lock, so readers never observe a
//! half-applied batch.

use dashmap::DashMap;
use listsync_engine::{BatchCounts, BatchRequest, Fields, ServerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One collection's rows.
#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Fields>,
}

impl Table {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Validation rules applied to every batch.
#[derive(Debug, Clone)]
pub struct BatchRules<'a> {
    pub id_field: &'a str,
    pub scope_keys: &'a [String],
}

/// All collections known to the server.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    tables: DashMap<String, Table>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Validate and apply one batch.
    ///
    /// Returns every validation message on failure, in entry order; nothing
    /// is applied in that case.
    pub fn apply_batch(
        &self,
        path: &str,
        batch: &BatchRequest,
        rules: &BatchRules<'_>,
    ) -> Result<BatchCounts, Vec<String>> {
        let mut table = self.tables.entry(path.to_string()).or_default();

        let mut problems = Vec::new();
        let sections = [
            ("adicionar", &batch.adicionar),
            ("editar", &batch.editar),
            ("remover", &batch.remover),
        ];
        for (section, entries) in sections {
            for (index, entry) in entries.iter().enumerate() {
                for key in rules.scope_keys {
                    if entry.get(key).map_or(true, |v| v.is_null()) {
                        problems.push(format!("{}[{}]: {} é obrigatório", section, index, key));
                    }
                }
            }
        }

        let mut edits = Vec::with_capacity(batch.editar.len());
        for (index, entry) in batch.editar.iter().enumerate() {
            match row_id(entry, rules.id_field) {
                Some(id) if table.rows.contains_key(&id) => edits.push((id, entry)),
                Some(id) => problems.push(format!("editar[{}]: registro {} não encontrado", index, id)),
                None => problems.push(format!("editar[{}]: {} inválido", index, rules.id_field)),
            }
        }

        let mut removals = Vec::with_capacity(batch.remover.len());
        for (index, entry) in batch.remover.iter().enumerate() {
            match row_id(entry, rules.id_field) {
                Some(id) => removals.push(id),
                None => problems.push(format!("remover[{}]: {} inválido", index, rules.id_field)),
            }
        }

        if !problems.is_empty() {
            return Err(problems);
        }

        let mut counts = BatchCounts::default();
        for fields in &batch.adicionar {
            let id = table.allocate();
            let mut row = fields.clone();
            row.insert(rules.id_field.to_string(), id.into());
            table.rows.insert(id, row);
            counts.created += 1;
        }
        for (id, fields) in edits {
            if let Some(row) = table.rows.get_mut(&id) {
                for (key, value) in fields {
                    row.insert(key.clone(), value.clone());
                }
                row.insert(rules.id_field.to_string(), id.into());
                counts.updated += 1;
            }
        }
        for id in removals {
            // Already gone when a batch is replayed
            if table.rows.remove(&id).is_some() {
                counts.removed += 1;
            }
        }

        tracing::debug!(
            collection = %path,
            created = counts.created,
            updated = counts.updated,
            removed = counts.removed,
            rows = table.rows.len(),
            "Batch applied"
        );
        Ok(counts)
    }

    /// Rows of a collection whose fields match every filter, in id order.
    pub fn list(&self, path: &str, filters: &HashMap<String, String>) -> Vec<Fields> {
        let Some(table) = self.tables.get(path) else {
            return Vec::new();
        };
        table
            .rows
            .values()
            .filter(|row| {
                filters
                    .iter()
                    .all(|(key, expected)| row.get(key).is_some_and(|v| render(v) == *expected))
            })
            .cloned()
            .collect()
    }

    pub fn len(&self, path: &str) -> usize {
        self.tables.get(path).map_or(0, |t| t.rows.len())
    }
}

fn row_id(entry: &Fields, id_field: &str) -> Option<i64> {
    match ServerId::from_value(entry.get(id_field)?)? {
        ServerId::Int(id) => Some(id),
        ServerId::Str(s) => s.parse().ok(),
    }
}

/// Same rendering the client uses for query parameters.
fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
