//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{rank, QueryTarget, VectorMatch, VectorQuery, VectorRecord, VectorStore};
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

type Namespace = HashMap<String, VectorRecord>;

/// In-memory vector store.
pub struct MemoryVectorStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> TubeTalkError {
    TubeTalkError::UpstreamUnavailable(format!("Vector store lock poisoned: {}", e))
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut namespaces = self.namespaces.write().map_err(poisoned)?;
        let store = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(&self, namespace: &str, query: &VectorQuery) -> Result<Vec<VectorMatch>> {
        let target = query.target()?;
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        let Some(store) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let vector = match target {
            QueryTarget::Vector(vector) => vector,
            QueryTarget::Id(id) => match store.get(id) {
                Some(record) => record.values.as_slice(),
                None => return Ok(Vec::new()),
            },
        };

        Ok(rank(store.values(), vector, query.top_k))
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        Ok(namespaces.get(namespace).map_or(0, HashMap::len))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        let mut namespaces = self.namespaces.write().map_err(poisoned)?;
        Ok(namespaces.remove(namespace).map_or(0, |ns| ns.len()))
    }
}
