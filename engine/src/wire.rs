//! Batch endpoint wire format.
//!
//! A collection is addressed by a base path (e.g. `Os/pecas`). Its batch
//! endpoint is `<path>/update-lista/` and takes
//!
//! ```json
//! { "adicionar": [{...fields}], "editar": [{"id": 10, ...fields}], "remover": [{"id": 11}] }
//! ```
//!
//! where every entry also carries the collection's scoping keys (tenant,
//! branch, parent record). The authoritative listing is `GET <path>/` with
//! the same scoping keys as query parameters.

use crate::{error::Result, BatchCounts, DiffBatch, Error, Fields, ServerId, ServerRecord};
use serde::{Deserialize, Serialize};

/// Default name of the server identifier field.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Addressing and scoping of one server-side collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEndpoint {
    /// Base path of the collection, without the batch suffix
    pub path: String,
    /// Field holding the server identifier in requests and listings
    pub id_field: String,
    /// Keys injected into every entry and every listing query
    pub scope: Fields,
}

impl CollectionEndpoint {
    /// Create an endpoint with the default id field and no scope.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            scope: Fields::new(),
        }
    }

    /// Use a backend-specific identifier field (e.g. `peca_item`).
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Add a scoping key.
    pub fn with_scope(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.scope.insert(key.into(), value.into());
        self
    }

    fn base(&self) -> &str {
        self.path.trim_matches('/')
    }

    /// Path of the batch endpoint.
    pub fn batch_path(&self) -> String {
        format!("{}/update-lista/", self.base())
    }

    /// Path of the authoritative listing.
    pub fn list_path(&self) -> String {
        format!("{}/", self.base())
    }

    /// Stable key naming this collection instance (path plus scope).
    ///
    /// Two endpoints with the same key edit the same server-side rows.
    pub fn key(&self) -> String {
        let scope: std::collections::BTreeMap<_, _> = self.scope.iter().collect();
        let scope = serde_json::to_string(&scope).unwrap_or_default();
        format!("{}{}", self.base(), scope)
    }

    /// Scope rendered as query parameters for the listing.
    pub fn query(&self) -> Vec<(String, String)> {
        self.scope
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }

    fn scoped(&self, mut entry: Fields) -> Fields {
        for (key, value) in &self.scope {
            entry.insert(key.clone(), value.clone());
        }
        entry
    }

    /// Build the request body for a batch.
    ///
    /// Scope keys override same-named fields. Create entries never carry the
    /// id field; the backend assigns it.
    pub fn build_request(&self, batch: &DiffBatch) -> BatchRequest {
        let adicionar = batch
            .create
            .iter()
            .map(|fields| {
                let mut entry = self.scoped(fields.clone());
                entry.remove(&self.id_field);
                entry
            })
            .collect();

        let editar = batch
            .update
            .iter()
            .map(|update| {
                let mut entry = self.scoped(update.fields.clone());
                entry.insert(self.id_field.clone(), update.server_id.to_value());
                entry
            })
            .collect();

        let remover = batch
            .delete
            .iter()
            .map(|server_id| {
                let mut entry = self.scoped(Fields::new());
                entry.insert(self.id_field.clone(), server_id.to_value());
                entry
            })
            .collect();

        BatchRequest {
            adicionar,
            editar,
            remover,
        }
    }

    /// Parse the authoritative listing into server records.
    ///
    /// Accepts a bare array or a paginated object with `results`.
    pub fn parse_records(&self, body: &serde_json::Value) -> Result<Vec<ServerRecord>> {
        let rows = match body {
            serde_json::Value::Array(rows) => rows,
            serde_json::Value::Object(map) => match map.get("results") {
                Some(serde_json::Value::Array(rows)) => rows,
                _ => {
                    return Err(Error::InvalidResponse(
                        "listing object without 'results' array".into(),
                    ))
                }
            },
            other => {
                return Err(Error::InvalidResponse(format!(
                    "expected listing array, got {}",
                    json_kind(other)
                )))
            }
        };

        rows.iter()
            .map(|row| {
                let fields = row.as_object().ok_or_else(|| {
                    Error::InvalidResponse(format!("expected record object, got {}", json_kind(row)))
                })?;
                let server_id = fields
                    .get(&self.id_field)
                    .and_then(ServerId::from_value)
                    .ok_or_else(|| Error::MissingServerId(self.id_field.clone()))?;
                Ok(ServerRecord {
                    server_id,
                    fields: fields.clone(),
                })
            })
            .collect()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Body of `POST <collection>/update-lista/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub adicionar: Vec<Fields>,
    #[serde(default)]
    pub editar: Vec<Fields>,
    #[serde(default)]
    pub remover: Vec<Fields>,
}

impl BatchRequest {
    /// Serialize into the JSON payload stored in the operation queue.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "adicionar": self.adicionar,
            "editar": self.editar,
            "remover": self.remover,
        })
    }
}

/// Read the counts out of a 2xx batch response.
///
/// Falls back to the batch's own counts when the body is absent or carries
/// none of the count keys.
pub fn counts_from_response(body: Option<&serde_json::Value>, fallback: BatchCounts) -> BatchCounts {
    const KEYS: [&str; 6] = [
        "adicionados",
        "editados",
        "removidos",
        "created",
        "updated",
        "removed",
    ];

    match body {
        Some(serde_json::Value::Object(map)) if KEYS.iter().any(|k| map.contains_key(*k)) => {
            serde_json::from_value(serde_json::Value::Object(map.clone())).unwrap_or(fallback)
        }
        _ => fallback,
    }
}
