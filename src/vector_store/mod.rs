//! Vector store abstraction for TubeTalk.
//!
//! Vectors live in namespaces (one per video); queries never cross namespaces.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::embedding::EmbeddedComment;
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Records are written in transactions of at most this many.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// A vector with its id and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    /// Parent comment id for replies.
    pub parent_id: Option<String>,
}

impl VectorRecord {
    pub fn from_embedded(comment: EmbeddedComment, parent_id: Option<String>) -> Self {
        Self {
            id: comment.comment_id,
            values: comment.vector,
            parent_id,
        }
    }
}

/// A similarity query. Exactly one of `vector` and `id` must be set.
#[derive(Debug, Clone, Default)]
pub struct VectorQuery {
    pub vector: Option<Vec<f32>>,
    /// Query with the stored vector of this id.
    pub id: Option<String>,
    pub top_k: usize,
}

impl VectorQuery {
    pub fn by_vector(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector: Some(vector),
            id: None,
            top_k,
        }
    }

    pub fn by_id(id: impl Into<String>, top_k: usize) -> Self {
        Self {
            vector: None,
            id: Some(id.into()),
            top_k,
        }
    }

    fn target(&self) -> Result<QueryTarget<'_>> {
        match (&self.vector, &self.id) {
            (Some(vector), None) => Ok(QueryTarget::Vector(vector)),
            (None, Some(id)) => Ok(QueryTarget::Id(id)),
            (Some(_), Some(_)) => Err(TubeTalkError::ContractMismatch(
                "query must set either a vector or an id, not both".to_string(),
            )),
            (None, None) => Err(TubeTalkError::ContractMismatch(
                "query must set a vector or an id".to_string(),
            )),
        }
    }
}

enum QueryTarget<'a> {
    Vector(&'a [f32]),
    Id(&'a str),
}

/// A query hit with score.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    /// Cosine similarity (higher is better).
    pub score: f32,
    pub parent_id: Option<String>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records in a namespace. Returns the number written.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Most similar records of a namespace, best first.
    async fn query(&self, namespace: &str, query: &VectorQuery) -> Result<Vec<VectorMatch>>;

    /// Number of records in a namespace.
    async fn count(&self, namespace: &str) -> Result<usize>;

    /// Remove a namespace and everything in it. Returns the number removed.
    async fn delete_namespace(&self, namespace: &str) -> Result<usize>;
}

/// Score every candidate against `query`, best first, keeping `top_k`.
fn rank<'a, I>(candidates: I, query: &[f32], top_k: usize) -> Vec<VectorMatch>
where
    I: IntoIterator<Item = &'a VectorRecord>,
{
    let mut results: Vec<VectorMatch> = candidates
        .into_iter()
        .map(|record| VectorMatch {
            id: record.id.clone(),
            score: cosine_similarity(query, &record.values),
            parent_id: record.parent_id.clone(),
        })
        .collect();

    // Sort by score descending
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(top_k);
    results
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Exercise a store through the trait: namespace isolation, ordering,
    /// id queries and deletion.
    pub async fn exercise_store(store: &dyn VectorStore) {
        let records = vec![
            VectorRecord {
                id: "a".to_string(),
                values: vec![1.0, 0.0, 0.0],
                parent_id: None,
            },
            VectorRecord {
                id: "b".to_string(),
                values: vec![0.8, 0.2, 0.0],
                parent_id: Some("a".to_string()),
            },
            VectorRecord {
                id: "c".to_string(),
                values: vec![0.0, 0.0, 1.0],
                parent_id: None,
            },
        ];
        assert_eq!(store.upsert("video1", &records).await.unwrap(), 3);
        store
            .upsert("video2", &[VectorRecord {
                id: "z".to_string(),
                values: vec![1.0, 0.0, 0.0],
                parent_id: None,
            }])
            .await
            .unwrap();

        assert_eq!(store.count("video1").await.unwrap(), 3);
        assert_eq!(store.count("video2").await.unwrap(), 1);
        assert_eq!(store.count("missing").await.unwrap(), 0);

        let hits = store
            .query("video1", &VectorQuery::by_vector(vec![1.0, 0.0, 0.0], 2))
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].parent_id.as_deref(), Some("a"));

        let by_id = store
            .query("video1", &VectorQuery::by_id("c", 10))
            .await
            .unwrap();
        assert_eq!(by_id[0].id, "c");
        assert_eq!(by_id.len(), 3);

        let unknown = store.query("video1", &VectorQuery::by_id("nope", 3)).await;
        assert!(unknown.unwrap().is_empty());

        let both = VectorQuery {
            vector: Some(vec![1.0, 0.0, 0.0]),
            id: Some("a".to_string()),
            top_k: 1,
        };
        assert!(matches!(
            store.query("video1", &both).await,
            Err(TubeTalkError::ContractMismatch(_))
        ));
        assert!(matches!(
            store.query("video1", &VectorQuery::default()).await,
            Err(TubeTalkError::ContractMismatch(_))
        ));

        // Replace keeps the count and changes the vector.
        store
            .upsert("video1", &[VectorRecord {
                id: "c".to_string(),
                values: vec![1.0, 0.0, 0.0],
                parent_id: None,
            }])
            .await
            .unwrap();
        assert_eq!(store.count("video1").await.unwrap(), 3);

        assert_eq!(store.delete_namespace("video1").await.unwrap(), 3);
        assert_eq!(store.count("video1").await.unwrap(), 0);
        assert_eq!(store.count("video2").await.unwrap(), 1);
    }
}
