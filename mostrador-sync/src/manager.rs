//! Client facade
//!
//! Single entry point for the application. Writes land in the local
//! store immediately and journal a pending change for replay; reads
//! come straight from the local store. Sync controls delegate to the
//! engine and the monitor.

use crate::change_log::ChangeLog;
use crate::config::{RemoteConfig, StoreConfig, SyncConfig};
use crate::engine::{SyncEngine, SyncState};
use crate::error::{SyncError, SyncResult};
use crate::local_store::LocalStore;
use crate::models::{
    offline_id, ChangeAction, Collection, Customer, Product, Sale, StoreStats, SyncReport,
    SyncStatus,
};
use crate::monitor::SyncMonitor;
use crate::remote::{HttpRemoteStore, RemoteStore};
use chrono::Utc;
use std::sync::Arc;

/// Offline-first entry point for the point of sale
pub struct OfflineManager {
    store: Arc<LocalStore>,
    log: Arc<ChangeLog>,
    engine: Arc<SyncEngine>,
    monitor: SyncMonitor,
}

impl OfflineManager {
    /// Open the local store and start the schedule loop against the
    /// given remote
    pub async fn new(
        store_config: &StoreConfig,
        sync_config: &SyncConfig,
        remote: Arc<dyn RemoteStore>,
    ) -> SyncResult<Self> {
        let store = Arc::new(LocalStore::open(store_config).await?);
        let log = Arc::new(ChangeLog::new(store.pool().clone()));
        let state = Arc::new(SyncState::new());
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            log.clone(),
            remote,
            state.clone(),
        ));
        let monitor = SyncMonitor::start(
            engine.clone(),
            log.clone(),
            state,
            sync_config.sync_interval_secs,
        );

        tracing::info!("Offline manager ready");

        Ok(Self {
            store,
            log,
            engine,
            monitor,
        })
    }

    /// Convenience constructor wiring the HTTP remote store
    pub async fn with_http_remote(
        store_config: &StoreConfig,
        sync_config: &SyncConfig,
        remote_config: RemoteConfig,
    ) -> SyncResult<Self> {
        let remote = Arc::new(HttpRemoteStore::new(remote_config)?);
        Self::new(store_config, sync_config, remote).await
    }

    /// Record a sale locally and journal it for replay. Missing id and
    /// timestamps are filled in.
    pub async fn register_offline_sale(&self, mut sale: Sale) -> SyncResult<Sale> {
        let now = Utc::now();
        if sale.id.is_none() {
            sale.id = Some(offline_id("sale"));
        }
        if sale.date.is_none() {
            sale.date = Some(now);
        }
        if sale.created_at.is_none() {
            sale.created_at = Some(now);
        }
        if sale.updated_at.is_none() {
            sale.updated_at = Some(now);
        }

        let payload = serde_json::to_value(&sale)?;
        self.log
            .append(Collection::Sales, payload.clone(), ChangeAction::Insert)
            .await?;
        self.store.put(Collection::Sales, &payload).await?;

        tracing::info!(
            sale_id = sale.id.as_deref().unwrap_or(""),
            total = sale.total,
            "Registered offline sale"
        );
        Ok(sale)
    }

    /// Store a product locally and journal it for replay
    pub async fn register_offline_product(&self, mut product: Product) -> SyncResult<Product> {
        let now = Utc::now();
        if product.id.is_none() {
            product.id = Some(offline_id("product"));
        }
        if product.created_at.is_none() {
            product.created_at = Some(now);
        }
        if product.updated_at.is_none() {
            product.updated_at = Some(now);
        }

        let payload = serde_json::to_value(&product)?;
        self.log
            .append(Collection::Products, payload.clone(), ChangeAction::Insert)
            .await?;
        self.store.put(Collection::Products, &payload).await?;

        tracing::info!(
            product_id = product.id.as_deref().unwrap_or(""),
            code = %product.code,
            "Registered offline product"
        );
        Ok(product)
    }

    /// Store a customer locally and journal it for replay
    pub async fn register_offline_customer(&self, mut customer: Customer) -> SyncResult<Customer> {
        let now = Utc::now();
        if customer.id.is_none() {
            customer.id = Some(offline_id("customer"));
        }
        if customer.created_at.is_none() {
            customer.created_at = Some(now);
        }
        if customer.updated_at.is_none() {
            customer.updated_at = Some(now);
        }

        let payload = serde_json::to_value(&customer)?;
        self.log
            .append(Collection::Customers, payload.clone(), ChangeAction::Insert)
            .await?;
        self.store.put(Collection::Customers, &payload).await?;

        tracing::info!(
            customer_id = customer.id.as_deref().unwrap_or(""),
            "Registered offline customer"
        );
        Ok(customer)
    }

    /// Overwrite a product locally and journal the update. The product
    /// must carry its id.
    pub async fn update_offline_product(&self, mut product: Product) -> SyncResult<Product> {
        if product.id.is_none() {
            return Err(SyncError::InvalidRecord(
                "products record has no id".to_string(),
            ));
        }
        product.updated_at = Some(Utc::now());

        let payload = serde_json::to_value(&product)?;
        self.log
            .append(Collection::Products, payload.clone(), ChangeAction::Update)
            .await?;
        self.store.put(Collection::Products, &payload).await?;

        tracing::debug!(
            product_id = product.id.as_deref().unwrap_or(""),
            "Updated offline product"
        );
        Ok(product)
    }

    /// Overwrite a customer locally and journal the update. The customer
    /// must carry its id.
    pub async fn update_offline_customer(&self, mut customer: Customer) -> SyncResult<Customer> {
        if customer.id.is_none() {
            return Err(SyncError::InvalidRecord(
                "customers record has no id".to_string(),
            ));
        }
        customer.updated_at = Some(Utc::now());

        let payload = serde_json::to_value(&customer)?;
        self.log
            .append(Collection::Customers, payload.clone(), ChangeAction::Update)
            .await?;
        self.store.put(Collection::Customers, &payload).await?;

        tracing::debug!(
            customer_id = customer.id.as_deref().unwrap_or(""),
            "Updated offline customer"
        );
        Ok(customer)
    }

    /// Remove a product locally and journal the deletion
    pub async fn delete_offline_product(&self, product_id: &str) -> SyncResult<()> {
        self.log
            .append(
                Collection::Products,
                serde_json::json!({ "id": product_id }),
                ChangeAction::Delete,
            )
            .await?;
        self.store.delete(Collection::Products, product_id).await?;

        tracing::info!(product_id, "Deleted offline product");
        Ok(())
    }

    /// Set the stock of a known product and journal the update
    pub async fn update_offline_stock(&self, product_id: &str, stock: i64) -> SyncResult<()> {
        let mut record = self
            .store
            .get(Collection::Products, product_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("Product {}", product_id)))?;

        if let Some(fields) = record.as_object_mut() {
            fields.insert("stock".to_string(), serde_json::json!(stock));
            fields.insert(
                "updated_at".to_string(),
                serde_json::json!(Utc::now().to_rfc3339()),
            );
        }

        self.log
            .append(Collection::Products, record.clone(), ChangeAction::Update)
            .await?;
        self.store.put(Collection::Products, &record).await?;

        tracing::debug!(product_id, stock, "Updated offline stock");
        Ok(())
    }

    /// Case-insensitive search over product name, code and brand
    pub async fn search_offline_products(
        &self,
        query: &str,
    ) -> SyncResult<Vec<serde_json::Value>> {
        let needle = query.to_lowercase();
        let products = self.store.get_all(Collection::Products).await?;

        Ok(products
            .into_iter()
            .filter(|product| {
                ["name", "code", "brand"].iter().any(|field| {
                    product
                        .get(field)
                        .and_then(|value| value.as_str())
                        .map(|text| text.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            })
            .collect())
    }

    pub async fn get_offline_products(&self) -> SyncResult<Vec<serde_json::Value>> {
        self.store.get_all(Collection::Products).await
    }

    pub async fn get_offline_sales(&self) -> SyncResult<Vec<serde_json::Value>> {
        self.store.get_all(Collection::Sales).await
    }

    pub async fn get_offline_customers(&self) -> SyncResult<Vec<serde_json::Value>> {
        self.store.get_all(Collection::Customers).await
    }

    pub async fn get_offline_employees(&self) -> SyncResult<Vec<serde_json::Value>> {
        self.store.get_all(Collection::Employees).await
    }

    /// Row counts per collection plus journal depth
    pub async fn get_offline_stats(&self) -> SyncResult<StoreStats> {
        self.store.stats().await
    }

    /// True when unsynced changes are waiting for a pass
    pub async fn has_pending_sync(&self) -> SyncResult<bool> {
        Ok(self.log.count_unsynced().await? > 0)
    }

    pub async fn get_pending_count(&self) -> SyncResult<i64> {
        self.log.count_unsynced().await
    }

    /// Drop every offline record and the whole journal
    pub async fn clear_offline_data(&self) -> SyncResult<()> {
        self.store.clear_all().await
    }

    /// Run a reconciliation pass now
    pub async fn sync_data(&self) -> SyncResult<SyncReport> {
        self.engine.sync_data().await
    }

    /// Explicitly requested pass, logged as such
    pub async fn force_sync(&self) -> SyncResult<SyncReport> {
        self.engine.force_sync().await
    }

    /// Current connectivity, progress and journal depth
    pub async fn sync_status(&self) -> SyncResult<SyncStatus> {
        self.monitor.sync_status().await
    }

    /// Report a connectivity change; coming back online triggers a pass
    pub fn set_online(&self, online: bool) {
        self.monitor.set_online(online);
    }

    /// Stop the background schedule loop
    pub async fn shutdown(&self) {
        self.monitor.shutdown().await;
    }
}
