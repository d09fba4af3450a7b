use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentRecord, DocumentStore};
use crate::error::StoreError;

/// In-memory store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    records: Arc<RwLock<BTreeMap<String, DocumentRecord>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with records keyed by their `id`.
    pub fn with_records(records: impl IntoIterator<Item = DocumentRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, record: &DocumentRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }
}
