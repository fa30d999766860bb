//! Document Store Gateway.
//!
//! The engine never talks to persistent storage directly; everything goes
//! through the narrow [`DocumentStore`] trait: per-path CRUD plus a change
//! feed. Paths are scoped under a tenant identifier and the layout
//! (`{tenant}/sales/{id}`, `{tenant}/stockMovements/{id}`, ...) is the
//! de facto persisted-state schema, preserved for compatibility with
//! existing data.

pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

pub use memory::InMemoryDocumentStore;

/// Collection names under the tenant root. CamelCase segments match the
/// layout of the store this engine interoperates with.
pub mod collections {
    pub const PRODUCTS: &str = "products";
    pub const STOCK_MOVEMENTS: &str = "stockMovements";
    pub const SALES: &str = "sales";
    pub const PURCHASES: &str = "purchases";
    pub const CUSTOMERS: &str = "customers";
    pub const SUPPLIERS: &str = "suppliers";
    pub const OLD_BATTERIES: &str = "oldBatteries";
    pub const OLD_BATTERY_CONSUMPTIONS: &str = "oldBatteryConsumptions";
    pub const PAYMENTS: &str = "payments";
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Kind of change delivered on the subscription feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Put,
    Update,
    Remove,
}

/// A single change notification. `value` is the document after the change,
/// absent for removals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChange {
    pub path: String,
    pub kind: ChangeKind,
    pub value: Option<Value>,
}

/// Key-value document store with per-record CRUD and change subscription.
///
/// `update` is a shallow merge of top-level fields, creating the document
/// when absent. `list` returns the direct children of a collection path,
/// which is what `get` on a collection path returns in the backing store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;
    async fn put(&self, path: &str, value: Value) -> Result<(), StoreError>;
    async fn update(&self, path: &str, partial: Value) -> Result<(), StoreError>;
    async fn remove(&self, path: &str) -> Result<(), StoreError>;
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;
    fn subscribe(&self) -> broadcast::Receiver<DocumentChange>;
}

/// Tenant-scoped typed facade over a [`DocumentStore`].
///
/// Services hold one of these instead of the raw trait object; it owns the
/// tenant prefix and the serde round-trips.
#[derive(Clone)]
pub struct TenantStore {
    inner: Arc<dyn DocumentStore>,
    tenant: String,
}

impl TenantStore {
    pub fn new(inner: Arc<dyn DocumentStore>, tenant: impl Into<String>) -> Self {
        Self {
            inner,
            tenant: tenant.into(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn doc_path(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.tenant, collection, id)
    }

    pub fn collection_path(&self, collection: &str) -> String {
        format!("{}/{}", self.tenant, collection)
    }

    pub async fn load<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let value = self.inner.get(&self.doc_path(collection, id)).await?;
        match value {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn save<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        document: &T,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(document)?;
        self.inner.put(&self.doc_path(collection, id), value).await
    }

    /// Shallow-merges `partial` into the document, creating it when absent.
    pub async fn merge(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> Result<(), StoreError> {
        self.inner
            .update(&self.doc_path(collection, id), partial)
            .await
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.remove(&self.doc_path(collection, id)).await
    }

    /// Loads every document in a collection. Documents that fail to
    /// deserialize are skipped; corrupt records must not wedge a scan.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<T>, StoreError> {
        let entries = self.inner.list(&self.collection_path(collection)).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(_, value)| serde_json::from_value(value).ok())
            .collect())
    }

    /// Raw variant of [`list_all`], keyed by document id.
    pub async fn list_raw(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        self.inner.list(&self.collection_path(collection)).await
    }

    /// Change feed for the whole tenant; callers filter by path prefix.
    pub fn watch(&self) -> broadcast::Receiver<DocumentChange> {
        self.inner.subscribe()
    }
}
