//! Reconciliation engine
//!
//! Drains the pending-change log against the remote store in arrival
//! order, marks successes, refreshes reference collections, then purges
//! the journal. Per-item failures accumulate in the report and never
//! abort a pass; a failed pull phase does.

use crate::change_log::ChangeLog;
use crate::error::{SyncError, SyncResult};
use crate::local_store::LocalStore;
use crate::models::{record_id, ChangeAction, Collection, PendingChange, SyncReport};
use crate::remote::{RemoteError, RemoteStore};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Connectivity and progress flags shared by the engine, the monitor
/// and the facade. Starts online until the application reports
/// otherwise.
pub(crate) struct SyncState {
    online: AtomicBool,
    syncing: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            syncing: AtomicBool::new(false),
            last_sync: Mutex::new(None),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Claim the syncing flag; false when a pass already holds it. The
    /// check and the flip are a single compare-and-swap.
    pub fn begin_sync(&self) -> bool {
        self.syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn end_sync(&self) {
        self.syncing.store(false, Ordering::SeqCst);
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync.lock().ok().and_then(|guard| *guard)
    }

    pub fn set_last_sync(&self, at: DateTime<Utc>) {
        if let Ok(mut guard) = self.last_sync.lock() {
            *guard = Some(at);
        }
    }
}

/// Orchestrates reconciliation passes
pub struct SyncEngine {
    store: Arc<LocalStore>,
    log: Arc<ChangeLog>,
    remote: Arc<dyn RemoteStore>,
    state: Arc<SyncState>,
}

impl SyncEngine {
    pub(crate) fn new(
        store: Arc<LocalStore>,
        log: Arc<ChangeLog>,
        remote: Arc<dyn RemoteStore>,
        state: Arc<SyncState>,
    ) -> Self {
        Self {
            store,
            log,
            remote,
            state,
        }
    }

    /// Run one reconciliation pass. Early exits (a pass already running,
    /// no connectivity) are reported, not errors.
    pub async fn sync_data(&self) -> SyncResult<SyncReport> {
        if !self.state.begin_sync() {
            tracing::debug!("Sync already in progress, skipping");
            return Ok(SyncReport::skipped("Sync already in progress"));
        }

        if !self.state.is_online() {
            self.state.end_sync();
            tracing::debug!("Offline, skipping sync");
            return Ok(SyncReport::skipped("No network connection"));
        }

        let result = self.run_pass().await;
        self.state.end_sync();
        result
    }

    /// Explicitly requested sync; runs the same pass as `sync_data`
    pub async fn force_sync(&self) -> SyncResult<SyncReport> {
        tracing::info!("Manual sync requested");
        self.sync_data().await
    }

    async fn run_pass(&self) -> SyncResult<SyncReport> {
        tracing::info!("Starting sync");

        let pending = self.log.list_unsynced().await?;
        let mut synced_items = 0usize;
        let mut errors = Vec::new();

        for entry in &pending {
            match self.replay_and_mark(entry).await {
                Ok(()) => synced_items += 1,
                Err(message) => {
                    tracing::warn!(
                        change_id = %entry.id,
                        collection = entry.collection.as_str(),
                        error = %message,
                        "Failed to replay change"
                    );
                    errors.push(format!("{}: {}", entry.collection.as_str(), message));
                }
            }
        }

        self.pull_reference_data().await?;

        let timestamp = Utc::now();
        self.state.set_last_sync(timestamp);

        let purged = self.log.purge_synced().await?;

        tracing::info!(synced_items, failed = errors.len(), purged, "Sync finished");

        Ok(SyncReport {
            success: errors.is_empty(),
            synced_items,
            errors,
            message: None,
            timestamp,
        })
    }

    /// Replay one entry and flip its flag. Any failure leaves the entry
    /// unsynced, to be retried on the next pass.
    async fn replay_and_mark(&self, entry: &PendingChange) -> Result<(), String> {
        self.replay(entry).await.map_err(|e| e.to_string())?;
        self.log
            .mark_synced(&entry.id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn replay(&self, entry: &PendingChange) -> Result<(), RemoteError> {
        if !entry.collection.is_replayable() {
            return Err(RemoteError::new(format!(
                "Unsupported collection: {}",
                entry.collection.as_str()
            )));
        }

        match entry.action {
            ChangeAction::Insert => {
                self.remote.insert(entry.collection, &entry.payload).await?;
                Ok(())
            }
            ChangeAction::Update => {
                let id = record_id(&entry.payload)
                    .ok_or_else(|| RemoteError::new("Update payload has no id"))?;
                self.remote
                    .update(entry.collection, &id, &entry.payload)
                    .await
            }
            ChangeAction::Delete => {
                let id = record_id(&entry.payload)
                    .ok_or_else(|| RemoteError::new("Delete payload has no id"))?;
                self.remote.delete(entry.collection, &id).await
            }
        }
    }

    /// Overwrite local reference collections with the remote snapshot.
    /// A failure here aborts the pass before `last_sync` and the purge.
    async fn pull_reference_data(&self) -> SyncResult<()> {
        for collection in Collection::REFERENCE {
            let rows =
                self.remote
                    .select_all(collection)
                    .await
                    .map_err(|e| SyncError::PullFailed {
                        collection: collection.as_str().to_string(),
                        message: e.to_string(),
                    })?;

            let count = rows.len();
            for row in &rows {
                self.store
                    .put(collection, row)
                    .await
                    .map_err(|e| SyncError::PullFailed {
                        collection: collection.as_str().to_string(),
                        message: e.to_string(),
                    })?;
            }

            tracing::debug!(
                collection = collection.as_str(),
                count,
                "Refreshed collection from remote"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::remote::mock::MockRemote;
    use tempfile::NamedTempFile;

    struct TestEngine {
        engine: Arc<SyncEngine>,
        remote: Arc<MockRemote>,
        store: Arc<LocalStore>,
        log: Arc<ChangeLog>,
        state: Arc<SyncState>,
        _file: NamedTempFile,
    }

    async fn create_test_engine() -> TestEngine {
        let temp_file = NamedTempFile::new().unwrap();
        let config = StoreConfig {
            db_path: temp_file.path().to_str().unwrap().to_string(),
            ..StoreConfig::default()
        };

        let store = Arc::new(LocalStore::open(&config).await.unwrap());
        let log = Arc::new(ChangeLog::new(store.pool().clone()));
        let remote = Arc::new(MockRemote::new());
        let state = Arc::new(SyncState::new());
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            log.clone(),
            remote.clone(),
            state.clone(),
        ));

        TestEngine {
            engine,
            remote,
            store,
            log,
            state,
            _file: temp_file,
        }
    }

    #[tokio::test]
    async fn test_empty_pass_sets_last_sync() {
        let t = create_test_engine().await;
        assert!(t.state.last_sync().is_none());

        let report = t.engine.sync_data().await.unwrap();

        assert!(report.success);
        assert_eq!(report.synced_items, 0);
        assert!(report.errors.is_empty());
        assert!(report.message.is_none());
        assert!(t.state.last_sync().is_some());
        assert!(!t.state.is_syncing());
    }

    #[tokio::test]
    async fn test_replays_marks_and_purges() {
        let t = create_test_engine().await;
        t.log
            .append(
                Collection::Products,
                serde_json::json!({"id": "product_1", "code": "FLT-100", "name": "Oil filter"}),
                ChangeAction::Insert,
            )
            .await
            .unwrap();

        let report = t.engine.sync_data().await.unwrap();

        assert!(report.success);
        assert_eq!(report.synced_items, 1);
        assert_eq!(t.remote.calls(), vec!["insert products product_1"]);
        assert_eq!(t.log.count_unsynced().await.unwrap(), 0);
        assert_eq!(t.store.stats().await.unwrap().pending_changes, 0);
    }

    #[tokio::test]
    async fn test_replay_applies_insert_before_update() {
        let t = create_test_engine().await;
        t.log
            .append(
                Collection::Products,
                serde_json::json!({
                    "id": "product_1",
                    "code": "FLT-100",
                    "name": "Oil filter",
                    "price": 9.5
                }),
                ChangeAction::Insert,
            )
            .await
            .unwrap();
        t.log
            .append(
                Collection::Products,
                serde_json::json!({"id": "product_1", "price": 12.0}),
                ChangeAction::Update,
            )
            .await
            .unwrap();

        let report = t.engine.sync_data().await.unwrap();

        assert!(report.success);
        assert_eq!(report.synced_items, 2);
        assert_eq!(
            t.remote.calls(),
            vec![
                "insert products product_1",
                "update products product_1",
            ]
        );

        let rows = t.remote.rows(Collection::Products);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["price"], 12.0);
        assert_eq!(rows[0]["code"], "FLT-100");
    }

    #[tokio::test]
    async fn test_item_failure_does_not_abort_batch() {
        let t = create_test_engine().await;
        for i in 1..=3 {
            t.log
                .append(
                    Collection::Sales,
                    serde_json::json!({"id": format!("sale_{}", i), "total": 10.0 * i as f64}),
                    ChangeAction::Insert,
                )
                .await
                .unwrap();
        }
        t.remote.fail_record("sale_2", "constraint violation");

        let report = t.engine.sync_data().await.unwrap();

        assert!(!report.success);
        assert_eq!(report.synced_items, 2);
        assert_eq!(report.errors, vec!["sales: constraint violation"]);

        let remote_ids: Vec<String> = t
            .remote
            .rows(Collection::Sales)
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(remote_ids, vec!["sale_1", "sale_3"]);

        let pending = t.log.list_unsynced().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload["id"], "sale_2");
        assert_eq!(t.store.stats().await.unwrap().pending_changes, 1);
    }

    #[tokio::test]
    async fn test_unsupported_collection_fails_per_item() {
        let t = create_test_engine().await;
        t.log
            .append(
                Collection::Inventory,
                serde_json::json!({"id": "inventory_1", "product_id": "product_1", "stock": 4}),
                ChangeAction::Insert,
            )
            .await
            .unwrap();
        t.log
            .append(
                Collection::Products,
                serde_json::json!({"id": "product_1", "code": "A", "name": "A"}),
                ChangeAction::Insert,
            )
            .await
            .unwrap();

        let report = t.engine.sync_data().await.unwrap();

        assert!(!report.success);
        assert_eq!(report.synced_items, 1);
        assert_eq!(
            report.errors,
            vec!["inventory: Unsupported collection: inventory"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_sync_reports_in_progress() {
        let t = create_test_engine().await;
        t.log
            .append(
                Collection::Products,
                serde_json::json!({"id": "product_1", "code": "A", "name": "A"}),
                ChangeAction::Insert,
            )
            .await
            .unwrap();

        let (entered, release) = t.remote.gate_inserts();

        let engine = t.engine.clone();
        let first = tokio::spawn(async move { engine.sync_data().await });

        entered.notified().await;

        let second = t.engine.sync_data().await.unwrap();
        assert!(!second.success);
        assert_eq!(second.synced_items, 0);
        assert_eq!(second.message.as_deref(), Some("Sync already in progress"));

        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(first.success);
        assert_eq!(first.synced_items, 1);

        // a single replay loop ran
        assert_eq!(t.remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_pass_skips_and_releases_flag() {
        let t = create_test_engine().await;
        t.state.set_online(false);
        t.log
            .append(
                Collection::Customers,
                serde_json::json!({"id": "customer_1", "name": "Carlos"}),
                ChangeAction::Insert,
            )
            .await
            .unwrap();

        let report = t.engine.sync_data().await.unwrap();
        assert!(!report.success);
        assert_eq!(report.message.as_deref(), Some("No network connection"));
        assert!(t.remote.calls().is_empty());
        assert_eq!(t.log.count_unsynced().await.unwrap(), 1);

        t.state.set_online(true);
        let report = t.engine.sync_data().await.unwrap();
        assert!(report.success);
        assert_eq!(report.synced_items, 1);
    }

    #[tokio::test]
    async fn test_pull_overwrites_reference_collections() {
        let t = create_test_engine().await;
        t.store
            .put(
                Collection::Products,
                &serde_json::json!({"id": "1", "code": "BRK-1", "name": "stale name"}),
            )
            .await
            .unwrap();
        t.remote.seed(
            Collection::Products,
            vec![serde_json::json!({"id": "1", "code": "BRK-1", "name": "Brake pad", "price": 15.0})],
        );
        t.remote.seed(
            Collection::Customers,
            vec![serde_json::json!({"id": "c1", "name": "Carlos Mendez"})],
        );
        t.remote.seed(
            Collection::Employees,
            vec![serde_json::json!({"id": "e1", "name": "Ana", "email": "ana@example.com"})],
        );
        t.remote.seed(
            Collection::Sales,
            vec![serde_json::json!({"id": "s9", "total": 150.0})],
        );

        let report = t.engine.sync_data().await.unwrap();
        assert!(report.success);

        let products = t.store.get_all(Collection::Products).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0]["name"], "Brake pad");

        assert_eq!(t.store.get_all(Collection::Customers).await.unwrap().len(), 1);
        assert_eq!(t.store.get_all(Collection::Employees).await.unwrap().len(), 1);

        // sales are write-mostly and never pulled back
        assert!(t.store.get_all(Collection::Sales).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pull_failure_aborts_pass() {
        let t = create_test_engine().await;
        t.log
            .append(
                Collection::Products,
                serde_json::json!({"id": "product_1", "code": "A", "name": "A"}),
                ChangeAction::Insert,
            )
            .await
            .unwrap();
        t.remote.fail_select(Collection::Customers, "service unavailable");

        let err = t.engine.sync_data().await.unwrap_err();
        match err {
            SyncError::PullFailed {
                collection,
                message,
            } => {
                assert_eq!(collection, "customers");
                assert_eq!(message, "service unavailable");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // no last-sync update, no purge, flag released
        assert!(t.state.last_sync().is_none());
        assert!(!t.state.is_syncing());
        assert_eq!(t.log.count_unsynced().await.unwrap(), 0);
        assert_eq!(t.store.stats().await.unwrap().pending_changes, 1);

        // a retry reaches the pull phase again instead of reporting in-progress
        let err = t.engine.sync_data().await.unwrap_err();
        assert!(matches!(err, SyncError::PullFailed { .. }));
    }

    #[tokio::test]
    async fn test_force_sync_runs_a_pass() {
        let t = create_test_engine().await;

        let report = t.engine.force_sync().await.unwrap();
        assert!(report.success);
        assert!(t.state.last_sync().is_some());
    }
}
