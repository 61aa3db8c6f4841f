//! Failure classification.
//!
//! Every component's retry behavior hangs off one decision: is a failed
//! delivery worth retrying (`Transient`) or permanently invalid
//! (`Rejected`)?
//!
//! - 2xx: delivered.
//! - 408 and 429: transient, the request itself was never judged.
//! - 401 and 403: transient. The credentials were refused, not the data, and
//!   a refreshed session can deliver the same request.
//! - any other 4xx: rejected, presumed invalid until the user changes input.
//! - 5xx, and anything else: transient.
//!
//! Network-level failures (timeouts, refused connections, DNS) never reach a
//! status code; transports classify them as transient directly.

use serde::{Deserialize, Serialize};

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    Delivered,
    Rejected,
    Transient,
}

/// Classify an HTTP status code.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Delivered,
        401 | 403 | 408 | 429 => Classification::Transient,
        400..=499 => Classification::Rejected,
        _ => Classification::Transient,
    }
}

/// The server refused the caller's credentials.
pub fn is_auth_failure(status: u16) -> bool {
    matches!(status, 401 | 403)
}

/// Extract human-readable messages from a rejection body.
///
/// Understands, in order: `detalhes: [{message}]`, `detail: "..."`, and a
/// field-error map (`{"field": ["msg"]}`, with `non_field_errors` shown
/// without its key). Bare strings and string arrays are taken as-is.
pub fn rejection_messages(body: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    match body {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().map(plain).collect(),
        Value::Object(map) => {
            if let Some(Value::Array(details)) = map.get("detalhes") {
                if !details.is_empty() {
                    return details
                        .iter()
                        .map(|d| match d.get("message") {
                            Some(Value::String(m)) => m.clone(),
                            _ => d.to_string(),
                        })
                        .collect();
                }
            }
            if let Some(Value::String(detail)) = map.get("detail") {
                return vec![detail.clone()];
            }
            map.iter()
                .map(|(key, value)| {
                    let message = match value {
                        Value::Array(parts) => {
                            parts.iter().map(plain).collect::<Vec<_>>().join(" ")
                        }
                        other => plain(other),
                    };
                    if key == "non_field_errors" {
                        message
                    } else {
                        format!("{}: {}", key, message)
                    }
                })
                .collect()
        }
        other => vec![other.to_string()],
    }
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
