//! In-memory document store used by tests and as the development backend.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{ChangeKind, DocumentChange, DocumentStore, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Process-local [`DocumentStore`] backed by a concurrent map.
pub struct InMemoryDocumentStore {
    documents: DashMap<String, Value>,
    changes: broadcast::Sender<DocumentChange>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            documents: DashMap::new(),
            changes,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn notify(&self, path: &str, kind: ChangeKind, value: Option<Value>) {
        // Nobody listening is fine.
        let _ = self.changes.send(DocumentChange {
            path: path.to_string(),
            kind,
            value,
        });
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.get(path).map(|entry| entry.value().clone()))
    }

    async fn put(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.documents.insert(path.to_string(), value.clone());
        self.notify(path, ChangeKind::Put, Some(value));
        Ok(())
    }

    async fn update(&self, path: &str, partial: Value) -> Result<(), StoreError> {
        let partial_object = match partial {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Backend(format!(
                    "update requires an object payload, got {}",
                    value_kind(&other)
                )))
            }
        };

        let merged = {
            let mut entry = self
                .documents
                .entry(path.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            match entry.value_mut() {
                Value::Object(existing) => {
                    for (key, value) in partial_object {
                        existing.insert(key, value);
                    }
                }
                other => *other = Value::Object(partial_object),
            }
            entry.value().clone()
        };

        self.notify(path, ChangeKind::Update, Some(merged));
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.documents.remove(path);
        self.notify(path, ChangeKind::Remove, None);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let prefix = format!("{}/", collection);
        let mut entries: Vec<(String, Value)> = self
            .documents
            .iter()
            .filter_map(|entry| {
                let suffix = entry.key().strip_prefix(&prefix)?;
                // Direct children only; nested paths belong to other
                // collections.
                if suffix.contains('/') {
                    return None;
                }
                Some((suffix.to_string(), entry.value().clone()))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
