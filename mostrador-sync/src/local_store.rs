//! Local SQLite store for offline data
//!
//! Provides:
//! - Durable per-collection record storage, JSON documents keyed by id
//! - Schema and index creation on open
//! - Record counts for diagnostics
//!
//! The pending-change journal lives in the same database; its table is
//! created here and managed by [`crate::change_log::ChangeLog`].

use crate::config::StoreConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::{record_id, Collection, StoreStats};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

/// Handle to the local offline database
#[derive(Debug)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Open or create the store at the configured path
    pub async fn open(config: &StoreConfig) -> SyncResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| SyncError::StorageUnavailable(e.to_string()))?;

        // Enable WAL mode for better concurrency
        if config.enable_wal {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await
                .map_err(|e| SyncError::StorageUnavailable(e.to_string()))?;
        }

        let store = Self { pool };
        store
            .initialize_schema()
            .await
            .map_err(|e| SyncError::StorageUnavailable(e.to_string()))?;

        tracing::info!(db_path = %config.db_path, "Opened local store");

        Ok(store)
    }

    /// Initialize database schema
    async fn initialize_schema(&self) -> SyncResult<()> {
        // One JSON-document table per record collection
        for collection in Collection::ALL {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    data TEXT NOT NULL
                )
                "#,
                collection.as_str()
            ))
            .execute(&self.pool)
            .await?;
        }

        // Pending-change journal
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_changes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                collection TEXT NOT NULL,
                payload TEXT NOT NULL,
                action TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_pending_synced ON pending_changes(synced)",
            "CREATE INDEX IF NOT EXISTS idx_pending_timestamp ON pending_changes(timestamp)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_products_code ON products(json_extract(data, '$.code'))",
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products(json_extract(data, '$.category'))",
            "CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(json_extract(data, '$.date'))",
            "CREATE INDEX IF NOT EXISTS idx_sales_employee ON sales(json_extract(data, '$.employee_id'))",
            "CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(json_extract(data, '$.name'))",
            "CREATE INDEX IF NOT EXISTS idx_customers_email ON customers(json_extract(data, '$.email'))",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_employees_email ON employees(json_extract(data, '$.email'))",
            "CREATE INDEX IF NOT EXISTS idx_employees_role ON employees(json_extract(data, '$.role'))",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_inventory_product ON inventory(json_extract(data, '$.product_id'))",
        ];
        for statement in indexes {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Upsert a record by its `id` field. The payload is stored opaquely;
    /// no domain fields are validated.
    pub async fn put(&self, collection: Collection, record: &serde_json::Value) -> SyncResult<()> {
        let id = record_id(record).ok_or_else(|| {
            SyncError::InvalidRecord(format!("{} record has no id", collection.as_str()))
        })?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, data) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET data = excluded.data
            "#,
            collection.as_str()
        ))
        .bind(&id)
        .bind(record.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch one record, or None if absent
    pub async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> SyncResult<Option<serde_json::Value>> {
        let row = sqlx::query(&format!(
            "SELECT data FROM {} WHERE id = ?",
            collection.as_str()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    /// Fetch every record in a collection, in insertion order
    pub async fn get_all(&self, collection: Collection) -> SyncResult<Vec<serde_json::Value>> {
        let rows = sqlx::query(&format!("SELECT data FROM {}", collection.as_str()))
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.try_get("data")?;
            records.push(serde_json::from_str(&data)?);
        }

        Ok(records)
    }

    /// Delete a record; no-op if absent
    pub async fn delete(&self, collection: Collection, id: &str) -> SyncResult<()> {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE id = ?",
            collection.as_str()
        ))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Wipe one collection
    pub async fn clear(&self, collection: Collection) -> SyncResult<()> {
        sqlx::query(&format!("DELETE FROM {}", collection.as_str()))
            .execute(&self.pool)
            .await?;

        tracing::debug!(collection = collection.as_str(), "Cleared collection");

        Ok(())
    }

    /// Wipe every collection and the pending-change journal
    pub async fn clear_all(&self) -> SyncResult<()> {
        for collection in Collection::ALL {
            self.clear(collection).await?;
        }

        sqlx::query("DELETE FROM pending_changes")
            .execute(&self.pool)
            .await?;

        tracing::warn!("Cleared all offline data");

        Ok(())
    }

    /// Record counts per collection plus the journal row total (synced
    /// rows included until they are purged), for diagnostics
    pub async fn stats(&self) -> SyncResult<StoreStats> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM pending_changes")
            .fetch_one(&self.pool)
            .await?;
        let pending_changes: i64 = row.try_get("count")?;

        Ok(StoreStats {
            products: self.count(Collection::Products).await?,
            sales: self.count(Collection::Sales).await?,
            customers: self.count(Collection::Customers).await?,
            employees: self.count(Collection::Employees).await?,
            inventory: self.count(Collection::Inventory).await?,
            pending_changes,
        })
    }

    async fn count(&self, collection: Collection) -> SyncResult<i64> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS count FROM {}",
            collection.as_str()
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }

    /// Shared connection pool, used by the change log
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
