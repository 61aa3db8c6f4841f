//! Request context: credentials and tenant headers.
//!
//! Every outbound call carries the same context. It is read at send time so
//! a token refreshed elsewhere is picked up by queued replays.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Supplies the bearer token and opaque headers for each request.
pub trait ContextProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Extra headers, e.g. tenant or branch selectors.
    fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Context held in memory and replaceable at runtime.
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    inner: Arc<RwLock<ContextValues>>,
}

#[derive(Debug, Clone, Default)]
struct ContextValues {
    token: Option<String>,
    headers: BTreeMap<String, String>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    pub fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut values) = self.inner.write() {
            values.headers.insert(name.into(), value.into());
        }
        self
    }

    /// Replace the bearer token (e.g. after a new login).
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut values) = self.inner.write() {
            values.token = token;
        }
    }
}

impl ContextProvider for StaticContext {
    fn bearer_token(&self) -> Option<String> {
        self.inner.read().ok().and_then(|v| v.token.clone())
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.inner
            .read()
            .map(|v| v.headers.clone())
            .unwrap_or_default()
    }
}
