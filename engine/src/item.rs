//! Line item types.

use crate::LocalId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque domain attributes of a line item (quantity, unit price, ...).
///
/// The engine never inspects these; they are passed through untouched.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Identifier assigned by the server once an item is persisted.
///
/// Backends use either integer or string keys, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerId {
    Int(i64),
    Str(String),
}

impl ServerId {
    /// Read a server identifier out of a JSON value.
    ///
    /// Numbers must be integral; empty strings and other types are rejected.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(ServerId::Int),
            serde_json::Value::String(s) if !s.is_empty() => Some(ServerId::Str(s.clone())),
            _ => None,
        }
    }

    /// Convert back into the JSON representation sent to the server.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ServerId::Int(n) => serde_json::Value::from(*n),
            ServerId::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerId::Int(n) => write!(f, "{}", n),
            ServerId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ServerId {
    fn from(value: i64) -> Self {
        ServerId::Int(value)
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        ServerId::Str(value.to_string())
    }
}

impl From<String> for ServerId {
    fn from(value: String) -> Self {
        ServerId::Str(value)
    }
}

/// One row of a locally edited collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Client-only identity, never transmitted
    pub local_id: LocalId,
    /// Server identity, absent until the server persists the item
    pub server_id: Option<ServerId>,
    /// Domain attributes
    pub fields: Fields,
    /// Queued for deletion; hidden from the active list
    pub tombstoned: bool,
}

impl LineItem {
    /// A new item that only exists locally.
    pub fn new_local(local_id: LocalId, fields: Fields) -> Self {
        Self {
            local_id,
            server_id: None,
            fields,
            tombstoned: false,
        }
    }

    /// An item known to the server.
    pub fn persisted(local_id: LocalId, server_id: ServerId, fields: Fields) -> Self {
        Self {
            local_id,
            server_id: Some(server_id),
            fields,
            tombstoned: false,
        }
    }

    /// Not yet persisted server-side.
    pub fn is_new(&self) -> bool {
        self.server_id.is_none()
    }

    /// Persisted server-side (possibly pending deletion).
    pub fn is_persisted(&self) -> bool {
        self.server_id.is_some()
    }

    /// Visible in the active list.
    pub fn is_active(&self) -> bool {
        !self.tombstoned
    }
}

/// An item as returned by the server's authoritative listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub server_id: ServerId,
    pub fields: Fields,
}

impl ServerRecord {
    pub fn new(server_id: impl Into<ServerId>, fields: Fields) -> Self {
        Self {
            server_id: server_id.into(),
            fields,
        }
    }
}
