//! Configuration management for the server.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Bearer token required on collection routes, if set
    pub auth_token: Option<String>,
    /// Keys every batch entry must carry
    pub scope_keys: Vec<String>,
    /// Identifier field in batches and listings
    pub id_field: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            auth_token: None,
            scope_keys: Vec::new(),
            id_field: "id".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let auth_token = env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        let scope_keys = env::var("SCOPE_KEYS")
            .map(|raw| parse_keys(&raw))
            .unwrap_or_default();

        let id_field = env::var("ID_FIELD").unwrap_or_else(|_| "id".to_string());
        if id_field.trim().is_empty() {
            return Err(ConfigError::InvalidIdField);
        }

        Ok(Self {
            host,
            port,
            auth_token,
            scope_keys,
            id_field,
        })
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_scope_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }
}

fn parse_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("ID_FIELD must not be empty")]
    InvalidIdField,
}
