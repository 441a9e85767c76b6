//! Connectivity and schedule monitor
//!
//! Owns the background task that runs a reconciliation pass on a fixed
//! interval and immediately when connectivity comes back.

use crate::change_log::ChangeLog;
use crate::engine::{SyncEngine, SyncState};
use crate::error::SyncResult;
use crate::models::SyncStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Schedule loop handle plus the connectivity switch
pub struct SyncMonitor {
    log: Arc<ChangeLog>,
    state: Arc<SyncState>,
    online_tx: watch::Sender<bool>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncMonitor {
    /// Spawn the schedule loop. Connectivity starts as online until the
    /// application reports otherwise.
    pub(crate) fn start(
        engine: Arc<SyncEngine>,
        log: Arc<ChangeLog>,
        state: Arc<SyncState>,
        sync_interval_secs: u64,
    ) -> Self {
        let (online_tx, online_rx) = watch::channel(true);
        let shutdown = Arc::new(Notify::new());
        let interval = Duration::from_secs(sync_interval_secs.max(1));

        let task = tokio::spawn(Self::run(
            engine,
            state.clone(),
            online_rx,
            shutdown.clone(),
            interval,
        ));

        Self {
            log,
            state,
            online_tx,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(
        engine: Arc<SyncEngine>,
        state: Arc<SyncState>,
        mut online_rx: watch::Receiver<bool>,
        shutdown: Arc<Notify>,
        interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // the first tick fires immediately; consume it so the loop
        // behaves like a plain every-N timer
        ticker.tick().await;

        let mut was_online = *online_rx.borrow();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if state.is_online() && !state.is_syncing() {
                        if let Err(e) = engine.sync_data().await {
                            tracing::error!(error = %e, "Scheduled sync failed");
                        }
                    }
                }
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if online && !was_online {
                        tracing::info!("Connection restored, starting sync");
                        if let Err(e) = engine.sync_data().await {
                            tracing::error!(error = %e, "Reconnect sync failed");
                        }
                    }
                    was_online = online;
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }

        tracing::debug!("Sync monitor stopped");
    }

    /// Report a connectivity change observed by the application
    pub fn set_online(&self, online: bool) {
        self.state.set_online(online);
        self.online_tx.send_replace(online);
        tracing::debug!(online, "Connectivity changed");
    }

    /// Current connectivity, progress and journal depth
    pub async fn sync_status(&self) -> SyncResult<SyncStatus> {
        let pending_changes = self.log.count_unsynced().await?;
        Ok(SyncStatus {
            is_online: self.state.is_online(),
            is_syncing: self.state.is_syncing(),
            pending_changes,
            last_sync: self.state.last_sync(),
        })
    }

    /// Stop the schedule loop and wait for it to exit. Safe to call
    /// more than once.
    pub async fn shutdown(&self) {
        self.shutdown.notify_one();
        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Sync monitor task ended abnormally");
            }
        }
    }
}
