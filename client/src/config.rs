//! Configuration management for the sync runtime.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Where queued operations are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    /// Lost on exit; for tests
    Memory,
    /// Single JSON document replaced atomically on every change
    File(PathBuf),
    /// SQLite database, one row per operation
    Sqlite(PathBuf),
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://host:8000/api`
    pub base_url: String,
    /// Bound on every network call
    pub timeout: Duration,
    pub queue: QueueBackend,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            queue: QueueBackend::File(PathBuf::from("listsync-queue.json")),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_queue(mut self, queue: QueueBackend) -> Self {
        self.queue = queue;
        self
    }

    /// Load configuration from environment variables, after any `.env`
    /// file in the working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let base_url = env::var("LISTSYNC_BASE_URL").map_err(|_| ConfigError::MissingBaseUrl)?;

        let timeout_secs = match env::var("LISTSYNC_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidTimeout(raw))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        if !(1..=120).contains(&timeout_secs) {
            return Err(ConfigError::InvalidTimeout(timeout_secs.to_string()));
        }

        let backend = env::var("LISTSYNC_QUEUE_BACKEND").unwrap_or_else(|_| "file".to_string());
        let path = env::var("LISTSYNC_QUEUE_PATH").ok().map(PathBuf::from);
        let queue = match backend.parse::<BackendKind>()? {
            BackendKind::Memory => QueueBackend::Memory,
            BackendKind::File => {
                QueueBackend::File(path.unwrap_or_else(|| PathBuf::from("listsync-queue.json")))
            }
            BackendKind::Sqlite => {
                QueueBackend::Sqlite(path.unwrap_or_else(|| PathBuf::from("listsync-queue.db")))
            }
        };

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            queue,
        })
    }
}

enum BackendKind {
    Memory,
    File,
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "sqlite" => Ok(BackendKind::Sqlite),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LISTSYNC_BASE_URL environment variable is required")]
    MissingBaseUrl,

    #[error("Invalid LISTSYNC_TIMEOUT_SECS value: {0} (expected 1..=120)")]
    InvalidTimeout(String),

    #[error("Invalid LISTSYNC_QUEUE_BACKEND value: {0}")]
    InvalidBackend(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("http://localhost:8000/api");
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(
            config.queue,
            QueueBackend::File(PathBuf::from("listsync-queue.json"))
        );
    }

    #[test]
    fn backend_names() {
        assert!(matches!("SQLite".parse::<BackendKind>(), Ok(BackendKind::Sqlite)));
        assert!(matches!(" memory ".parse::<BackendKind>(), Ok(BackendKind::Memory)));
        assert!(matches!(
            "redis".parse::<BackendKind>(),
            Err(ConfigError::InvalidBackend(_))
        ));
    }

    // Only test touching process environment
    #[test]
    fn from_env_reads_variables() {
        env::set_var("LISTSYNC_BASE_URL", "http://example.test/api");
        env::set_var("LISTSYNC_TIMEOUT_SECS", "5");
        env::set_var("LISTSYNC_QUEUE_BACKEND", "sqlite");
        env::set_var("LISTSYNC_QUEUE_PATH", "/tmp/q.db");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url, "http://example.test/api");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.queue, QueueBackend::Sqlite(PathBuf::from("/tmp/q.db")));

        env::set_var("LISTSYNC_TIMEOUT_SECS", "0");
        assert!(matches!(
            ClientConfig::from_env(),
            Err(ConfigError::InvalidTimeout(_))
        ));

        for key in [
            "LISTSYNC_BASE_URL",
            "LISTSYNC_TIMEOUT_SECS",
            "LISTSYNC_QUEUE_BACKEND",
            "LISTSYNC_QUEUE_PATH",
        ] {
            env::remove_var(key);
        }
        assert!(matches!(
            ClientConfig::from_env(),
            Err(ConfigError::MissingBaseUrl)
        ));
    }
}
