//! Data model for the offline layer
//!
//! Provides:
//! - Collection and change-action enums used across the store and the log
//! - The pending-change journal entry
//! - Typed domain records accepted by the client facade
//! - Status, report and statistics types

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Named record collections in the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Products,
    Sales,
    Customers,
    Employees,
    Inventory,
}

impl Collection {
    /// Every collection, in schema order
    pub const ALL: [Collection; 5] = [
        Collection::Products,
        Collection::Sales,
        Collection::Customers,
        Collection::Employees,
        Collection::Inventory,
    ];

    /// Collections refreshed from the remote store after each replay pass.
    /// Sales are write-mostly from the client and are not pulled back.
    pub const REFERENCE: [Collection; 3] = [
        Collection::Products,
        Collection::Customers,
        Collection::Employees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Sales => "sales",
            Collection::Customers => "customers",
            Collection::Employees => "employees",
            Collection::Inventory => "inventory",
        }
    }

    pub fn from_str(s: &str) -> SyncResult<Self> {
        match s {
            "products" => Ok(Collection::Products),
            "sales" => Ok(Collection::Sales),
            "customers" => Ok(Collection::Customers),
            "employees" => Ok(Collection::Employees),
            "inventory" => Ok(Collection::Inventory),
            _ => Err(SyncError::InvalidOperation(format!(
                "Unknown collection: {}",
                s
            ))),
        }
    }

    /// Whether changes to this collection can be replayed against the
    /// remote store. Inventory is local-only.
    pub fn is_replayable(&self) -> bool {
        !matches!(self, Collection::Inventory)
    }
}

/// Action recorded in the pending-change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Insert => "INSERT",
            ChangeAction::Update => "UPDATE",
            ChangeAction::Delete => "DELETE",
        }
    }

    pub fn from_str(s: &str) -> SyncResult<Self> {
        match s {
            "INSERT" => Ok(ChangeAction::Insert),
            "UPDATE" => Ok(ChangeAction::Update),
            "DELETE" => Ok(ChangeAction::Delete),
            _ => Err(SyncError::InvalidOperation(format!(
                "Unknown change action: {}",
                s
            ))),
        }
    }
}

/// One queued, not-yet-acknowledged mutation awaiting replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChange {
    /// Unique change id: collection name, creation millis and a random suffix
    pub id: String,

    /// Target collection
    pub collection: Collection,

    /// Record being inserted or updated, or `{"id": ...}` alone for deletes
    pub payload: serde_json::Value,

    /// Mutation kind
    pub action: ChangeAction,

    /// Creation time in milliseconds since the epoch
    pub timestamp: i64,

    /// Whether this change has been replayed against the remote store
    pub synced: bool,
}

impl PendingChange {
    /// Create a new unsynced change stamped with the current time
    pub fn new(collection: Collection, payload: serde_json::Value, action: ChangeAction) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        let id = format!("{}_{}_{}", collection.as_str(), timestamp, random_suffix());

        Self {
            id,
            collection,
            payload,
            action,
            timestamp,
            synced: false,
        }
    }
}

/// Generate a unique offline record id of the form `<prefix>_<millis>_<suffix>`
pub fn offline_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp_millis(),
        random_suffix()
    )
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect()
}

/// Extract the primary key from a record payload. Remote rows may carry
/// numeric ids; they are normalized to their decimal string form.
pub(crate) fn record_id(record: &serde_json::Value) -> Option<String> {
    match record.get("id") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Product mirrored from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One line of a sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: String,
    pub quantity: i64,
    pub price: f64,
}

/// Sale recorded at the counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub items: Vec<SaleItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Customer record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Snapshot of the sync state, computed on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    /// Unsynced entries in the pending-change log at the moment of the call
    pub pending_changes: i64,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    /// Changes replayed and marked synced during this pass
    pub synced_items: usize,
    /// Per-item failures, formatted as `<collection>: <message>`
    pub errors: Vec<String>,
    /// Why the pass did not run, for early exits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncReport {
    /// Report for a pass that could not start
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: false,
            synced_items: 0,
            errors: Vec::new(),
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Record counts per collection, for diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub products: i64,
    pub sales: i64,
    pub customers: i64,
    pub employees: i64,
    pub inventory: i64,
    /// Rows in the pending-change journal, synced or not
    pub pending_changes: i64,
}
