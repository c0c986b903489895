//! In-memory document store.

use super::DocumentStore;
use crate::comments::NormalizedRecord;
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<String, NormalizedRecord>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> TubeTalkError {
    TubeTalkError::UpstreamUnavailable(format!("Document store lock poisoned: {}", e))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(&self, collection: &str, records: &[NormalizedRecord]) -> Result<usize> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let docs = collections.entry(collection.to_string()).or_default();
        for record in records {
            docs.insert(record.comment_id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn get_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<NormalizedRecord>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| docs.get(id)).cloned().collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(collection).map_or(0, HashMap::len))
    }
}
