//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials are available before starting
//! operations that would otherwise fail midway.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{Result, TubeTalkError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Analysis fetches comments and embeds them.
    Analyze,
    /// Asking questions embeds the question.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    if let Operation::Analyze = operation {
        if settings.youtube.resolve_api_key().is_none() {
            return Err(TubeTalkError::Config(
                "YouTube API key not set. Set it with: export YOUTUBE_API_KEY='...'".to_string(),
            ));
        }
    }
    check_embedding_key(settings)
}

fn check_embedding_key(settings: &Settings) -> Result<()> {
    match settings.embedding.provider {
        EmbeddingProvider::Cohere => match settings.embedding.resolve_cohere_api_key() {
            Some(_) => Ok(()),
            None => Err(TubeTalkError::Config(
                "COHERE_API_KEY not set. Set it with: export COHERE_API_KEY='...'".to_string(),
            )),
        },
        EmbeddingProvider::OpenAI => match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(()),
            _ => Err(TubeTalkError::Config(
                "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_keys_pass() {
        let mut settings = Settings::default();
        settings.youtube.api_key = Some("yt-key".to_string());
        settings.embedding.cohere_api_key = Some("co-key".to_string());

        assert!(check(Operation::Analyze, &settings).is_ok());
        assert!(check(Operation::Ask, &settings).is_ok());
    }
}
