//! Network transport.
//!
//! A [`Transport`] performs one request and reports a [`Delivery`], already
//! classified. Batch submission and queue replay share the same transport so
//! both apply the same classification.

use crate::config::ConfigError;
use crate::context::ContextProvider;
use async_trait::async_trait;
use listsync_engine::{
    classify_status, is_auth_failure, rejection_messages, Classification, Method,
};
use std::sync::Arc;
use std::time::Duration;

/// Bound on the reachability probe, independent of the request timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One request against the API, relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl OutboundRequest {
    pub fn get(path: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query,
            body: None,
        }
    }

    pub fn new(method: Method, path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }
}

/// Classified outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// 2xx; the body is absent if it was empty or not JSON
    Delivered {
        status: u16,
        body: Option<serde_json::Value>,
    },
    /// Permanently invalid as sent
    Rejected { status: u16, details: Vec<String> },
    /// Worth retrying: network failure, timeout, 5xx, 408, 429
    Transient { reason: String },
}

impl Delivery {
    /// Classify a received response.
    pub fn from_response(status: u16, body: Option<serde_json::Value>) -> Self {
        match classify_status(status) {
            Classification::Delivered => Delivery::Delivered { status, body },
            Classification::Rejected => {
                let mut details = body.as_ref().map(rejection_messages).unwrap_or_default();
                if details.is_empty() {
                    details.push(format!("HTTP {}", status));
                }
                Delivery::Rejected { status, details }
            }
            Classification::Transient if is_auth_failure(status) => Delivery::Transient {
                reason: format!("unauthorized (HTTP {})", status),
            },
            Classification::Transient => Delivery::Transient {
                reason: format!("HTTP {}", status),
            },
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Delivery::Delivered { .. } => Classification::Delivered,
            Delivery::Rejected { .. } => Classification::Rejected,
            Delivery::Transient { .. } => Classification::Transient,
        }
    }
}

/// Performs requests against the API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Delivery;

    /// Whether the API answers at all. Used before a drain cycle.
    async fn probe(&self) -> bool {
        true
    }
}

/// HTTP transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    context: Arc<dyn ContextProvider>,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        context: Arc<dyn ContextProvider>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            context,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Delivery {
        let url = self.url(&request.path);
        let mut builder = self.client.request(Self::method(request.method), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.context.bearer_token() {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in self.context.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("timed out: {}", e)
                } else {
                    e.to_string()
                };
                tracing::debug!(method = %request.method, %url, %reason, "request failed");
                return Delivery::Transient { reason };
            }
        };

        let status = response.status().as_u16();
        // A 2xx whose body cannot be read still counts as delivered
        let body = match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes).ok(),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(%url, status, "failed to read response body: {}", e);
                None
            }
        };

        tracing::debug!(method = %request.method, %url, status, "request completed");
        Delivery::from_response(status, body)
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/", self.base_url);
        match self
            .client
            .head(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().as_u16() < 500,
            Err(e) => {
                tracing::debug!(%url, "probe failed: {}", e);
                false
            }
        }
    }
}
