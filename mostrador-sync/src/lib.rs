//! Offline-first synchronization engine for the Mostrador point of sale
//!
//! Provides:
//! - Local SQLite store for offline operations
//! - Durable pending-change log replayed in arrival order
//! - Reconciliation engine with per-item fault isolation
//! - Connectivity and schedule monitor with automatic retry on reconnect
//! - Client facade for optimistic local writes and offline reads

pub mod error;
pub mod config;
pub mod models;
pub mod local_store;
pub mod change_log;
pub mod remote;
pub mod engine;
pub mod monitor;
pub mod manager;

pub use error::{SyncError, SyncResult};
pub use config::{RemoteConfig, StoreConfig, SyncConfig};
pub use models::{
    offline_id, ChangeAction, Collection, Customer, PendingChange, Product, Sale, SaleItem,
    StoreStats, SyncReport, SyncStatus,
};
pub use local_store::LocalStore;
pub use change_log::ChangeLog;
pub use remote::{HttpRemoteStore, RemoteError, RemoteStore};
pub use engine::SyncEngine;
pub use monitor::SyncMonitor;
pub use manager::OfflineManager;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockRemote;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_manager_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let store_config = StoreConfig {
            db_path: temp_file.path().to_str().unwrap().to_string(),
            ..StoreConfig::default()
        };

        let manager = OfflineManager::new(
            &store_config,
            &SyncConfig::default(),
            Arc::new(MockRemote::new()),
        )
        .await
        .unwrap();

        let status = manager.sync_status().await.unwrap();
        assert!(status.is_online);
        assert!(!status.is_syncing);
        assert_eq!(status.pending_changes, 0);
        assert!(status.last_sync.is_none());

        manager.shutdown().await;
    }
}
