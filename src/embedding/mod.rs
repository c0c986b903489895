//! Embedding generation for comment clustering and retrieval.

mod cohere;
mod openai;

pub use cohere::CohereEmbedder;
pub use openai::OpenAIEmbedder;

use crate::comments::NormalizedRecord;
use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A comment id paired with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedComment {
    pub comment_id: String,
    pub vector: Vec<f32>,
}

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, one per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Create the embedder selected in settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    Ok(match settings.provider {
        EmbeddingProvider::Cohere => Arc::new(CohereEmbedder::new(settings)?),
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::new(settings)?),
    })
}

/// Embed every record's text and pair the vectors with their comment ids.
#[instrument(skip_all, fields(count = records.len()))]
pub async fn embed_comments(
    embedder: &dyn Embedder,
    records: &[NormalizedRecord],
) -> Result<Vec<EmbeddedComment>> {
    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    if vectors.len() != records.len() {
        return Err(TubeTalkError::ContractMismatch(format!(
            "embedder returned {} vectors for {} comments",
            vectors.len(),
            records.len()
        )));
    }

    Ok(records
        .iter()
        .zip(vectors)
        .map(|(record, vector)| EmbeddedComment {
            comment_id: record.comment_id.clone(),
            vector,
        })
        .collect())
}

/// Split `texts` into batches, run up to `max_concurrent` of them at once and
/// reassemble the vectors in input order.
///
/// Any failed batch fails the whole call. Every batch must return exactly as
/// many vectors as it was sent.
pub(crate) async fn embed_in_batches<'a, F, Fut>(
    texts: &'a [String],
    batch_size: usize,
    max_concurrent: usize,
    embed_one: F,
) -> Result<Vec<Vec<f32>>>
where
    F: Fn(&'a [String]) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<f32>>>>,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batches: Vec<&[String]> = texts.chunks(batch_size.max(1)).collect();
    debug!(
        "Embedding {} texts in {} batches",
        texts.len(),
        batches.len()
    );

    let batch_futures: Vec<_> = batches
        .into_iter()
        .enumerate()
        .map(|(idx, batch)| {
            let fut = embed_one(batch);
            async move { (idx, fut.await, batch.len()) }
        })
        .collect();

    let mut results: Vec<(usize, Result<Vec<Vec<f32>>>, usize)> = stream::iter(batch_futures)
    .buffer_unordered(max_concurrent.max(1))
    .collect()
    .await;

    results.sort_by_key(|(idx, _, _)| *idx);

    let mut all = Vec::with_capacity(texts.len());
    for (idx, result, sent) in results {
        let vectors = result?;
        if vectors.len() != sent {
            return Err(TubeTalkError::ContractMismatch(format!(
                "batch {} returned {} vectors for {} texts",
                idx,
                vectors.len(),
                sent
            )));
        }
        all.extend(vectors);
    }

    Ok(all)
}


#[cfg(test)]
mod tests {
    use super::testing::{stub_vector, StubEmbedder};
    use super::*;
    use std::time::Duration;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("comment number {}", i)).collect()
    }

    #[tokio::test]
    async fn test_batches_keep_input_order() {
        let input = texts(10);

        // Earlier batches finish last.
        let vectors = embed_in_batches(&input, 3, 4, |batch| async move {
            let first: u64 = batch[0].rsplit(' ').next().unwrap().parse().unwrap();
            let delay = 40 - first * 3;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(batch.iter().map(|t| stub_vector(t)).collect())
        })
        .await
        .unwrap();

        let expected: Vec<Vec<f32>> = input.iter().map(|t| stub_vector(t)).collect();
        assert_eq!(vectors, expected);
    }

    #[tokio::test]
    async fn test_short_batch_is_contract_mismatch() {
        let input = texts(5);
        let err = embed_in_batches(&input, 2, 2, |batch| async move {
            Ok(batch.iter().skip(1).map(|t| stub_vector(t)).collect())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, TubeTalkError::ContractMismatch(_)));
    }

    #[tokio::test]
    async fn test_failed_batch_fails_call() {
        let input = texts(6);
        let result = embed_in_batches(&input, 2, 3, |batch| async move {
            if batch[0].ends_with('2') {
                Err(TubeTalkError::UpstreamUnavailable("boom".to_string()))
            } else {
                Ok(batch.iter().map(|t| stub_vector(t)).collect())
            }
        })
        .await;

        assert!(matches!(result, Err(TubeTalkError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let vectors = embed_in_batches(&[], 2, 2, |_| async {
            Err::<Vec<Vec<f32>>, _>(TubeTalkError::UpstreamUnavailable("called".to_string()))
        })
        .await
        .unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn test_embed_comments_pairs_ids() {
        let records: Vec<NormalizedRecord> = ["a1", "b2", "c3", "d4"]
            .iter()
            .map(|id| NormalizedRecord {
                comment_id: id.to_string(),
                author: String::new(),
                text: format!("text of {}", id),
                parent_comment_id: None,
                like_count: 0,
                published_at: None,
            })
            .collect();

        let embedded = embed_comments(&StubEmbedder, &records).await.unwrap();
        assert_eq!(embedded.len(), 4);
        for (pair, record) in embedded.iter().zip(&records) {
            assert_eq!(pair.comment_id, record.comment_id);
            assert_eq!(pair.vector, stub_vector(&record.text));
        }
    }
}
