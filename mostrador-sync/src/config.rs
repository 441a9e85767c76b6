//! Configuration for the local store, the remote client and the sync schedule

use serde::{Deserialize, Serialize};

/// Configuration for the local offline database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the database file
    pub db_path: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Whether to enable WAL mode
    pub enable_wal: bool,
}

impl StoreConfig {
    /// Create a config for the given database file
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_wal(mut self, enabled: bool) -> Self {
        self.enable_wal = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "mostrador_offline.db".to_string(),
            max_connections: 5,
            enable_wal: true,
        }
    }
}

/// Configuration for the HTTP remote store client
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote REST API
    pub base_url: String,
    /// API key sent with every request
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl RemoteConfig {
    /// Create a config pointing at the given REST base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, request_timeout_secs: u64) -> Self {
        self.request_timeout_secs = request_timeout_secs;
        self
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/rest/v1".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

/// Configuration for the sync schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between automatic sync passes
    pub sync_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_connections, 5);
        assert!(config.enable_wal);
    }

    #[test]
    fn test_store_config_builders() {
        let config = StoreConfig::new("/tmp/test.db")
            .with_max_connections(2)
            .with_wal(false);
        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.max_connections, 2);
        assert!(!config.enable_wal);
    }

    #[test]
    fn test_remote_config_builders() {
        let config = RemoteConfig::new("https://api.example.com/rest/v1")
            .with_api_key("key-123")
            .with_timeout(5);
        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_sync_config_default_interval() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_interval_secs, 300);
    }
}
