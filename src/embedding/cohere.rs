//! Cohere embeddings over the REST API.

use super::{embed_in_batches, Embedder};
use crate::config::EmbeddingSettings;
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Cohere-based embedder.
pub struct CohereEmbedder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    truncate: String,
    dimensions: usize,
    batch_size: usize,
    max_concurrent_batches: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    truncate: &'a str,
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl CohereEmbedder {
    /// Create an embedder from settings. Fails when no API key is configured.
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = settings.resolve_cohere_api_key().ok_or_else(|| {
            TubeTalkError::Config(
                "Cohere API key not set. Set COHERE_API_KEY or embedding.cohere_api_key".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| TubeTalkError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/v1/embed", settings.cohere_base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            truncate: settings.truncate.clone(),
            dimensions: settings.dimensions as usize,
            batch_size: settings.batch_size,
            max_concurrent_batches: settings.max_concurrent_batches,
        })
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            texts,
            model: &self.model,
            truncate: &self.truncate,
            input_type: "clustering",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TubeTalkError::UpstreamUnavailable(format!(
                "Cohere embed returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for CohereEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| {
            TubeTalkError::ContractMismatch("Empty embedding response".to_string())
        })
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = embed_in_batches(
            texts,
            self.batch_size,
            self.max_concurrent_batches,
            |batch| self.embed_request(batch),
        )
        .await?;

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let settings = EmbeddingSettings {
            cohere_api_key: Some("test-key".to_string()),
            cohere_base_url: "https://api.cohere.ai/".to_string(),
            ..Default::default()
        };
        let embedder = CohereEmbedder::new(&settings).unwrap();

        assert_eq!(embedder.endpoint, "https://api.cohere.ai/v1/embed");
        assert_eq!(embedder.dimensions(), 1024);
        assert_eq!(embedder.batch_size, 96);
        assert_eq!(embedder.truncate, "END");
    }

    #[test]
    fn test_request_shape() {
        let texts = vec!["first".to_string(), "second".to_string()];
        let request = EmbedRequest {
            texts: &texts,
            model: "embed-english-v3.0",
            truncate: "END",
            input_type: "clustering",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["texts"][1], "second");
        assert_eq!(json["truncate"], "END");
        assert_eq!(json["input_type"], "clustering");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"id": "x", "embeddings": [[0.5, -0.25], [1.0, 0.0]]}"#).unwrap();
        assert_eq!(parsed.embeddings, vec![vec![0.5, -0.25], vec![1.0, 0.0]]);
    }
}
