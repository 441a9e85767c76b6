//! Append-only journal of pending offline mutations
//!
//! Provides:
//! - Durable queueing of local changes awaiting replay
//! - FIFO retrieval of unsynced entries
//! - Idempotent sync marking and purge of replayed entries
//!
//! Entries are never mutated except to flip `synced`; they are removed
//! only by [`ChangeLog::purge_synced`] after a completed pass.

use crate::error::SyncResult;
use crate::models::{ChangeAction, Collection, PendingChange};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Handle to the pending-change journal
pub struct ChangeLog {
    pool: SqlitePool,
}

impl ChangeLog {
    /// Wrap the shared store pool. The journal table is created by
    /// [`crate::local_store::LocalStore::open`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a new unsynced change; returns the stored entry
    pub async fn append(
        &self,
        collection: Collection,
        payload: serde_json::Value,
        action: ChangeAction,
    ) -> SyncResult<PendingChange> {
        let change = PendingChange::new(collection, payload, action);

        sqlx::query(
            r#"
            INSERT INTO pending_changes (id, collection, payload, action, timestamp, synced)
            VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&change.id)
        .bind(change.collection.as_str())
        .bind(change.payload.to_string())
        .bind(change.action.as_str())
        .bind(change.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            change_id = %change.id,
            collection = change.collection.as_str(),
            action = change.action.as_str(),
            "Queued offline change"
        );

        Ok(change)
    }

    /// All unsynced entries in arrival order. The creation timestamp
    /// orders the replay; the insertion sequence breaks millisecond ties.
    pub async fn list_unsynced(&self) -> SyncResult<Vec<PendingChange>> {
        let rows = sqlx::query(
            r#"
            SELECT id, collection, payload, action, timestamp, synced
            FROM pending_changes
            WHERE synced = 0
            ORDER BY timestamp ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let collection: String = row.try_get("collection")?;
            let payload: String = row.try_get("payload")?;
            let action: String = row.try_get("action")?;
            let timestamp: i64 = row.try_get("timestamp")?;
            let synced: i64 = row.try_get("synced")?;

            entries.push(PendingChange {
                id,
                collection: Collection::from_str(&collection)?,
                payload: serde_json::from_str(&payload)?,
                action: ChangeAction::from_str(&action)?,
                timestamp,
                synced: synced != 0,
            });
        }

        Ok(entries)
    }

    /// Flip the synced flag; a no-op for unknown or already-synced ids
    pub async fn mark_synced(&self, id: &str) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE pending_changes
            SET synced = 1
            WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(change_id = %id, "Marked change as synced");

        Ok(())
    }

    /// Delete every synced entry; returns the number removed
    pub async fn purge_synced(&self) -> SyncResult<u64> {
        let result = sqlx::query("DELETE FROM pending_changes WHERE synced = 1")
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Purged synced changes");
        }

        Ok(purged)
    }

    /// Live count of unsynced entries
    pub async fn count_unsynced(&self) -> SyncResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM pending_changes WHERE synced = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("count")?)
    }
}
