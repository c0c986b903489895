//! Configuration settings for TubeTalk.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub youtube: YoutubeSettings,
    pub embedding: EmbeddingSettings,
    pub analysis: AnalysisSettings,
    pub storage: StorageSettings,
    pub qa: QaSettings,
    pub llm: LlmSettings,
    pub cache: CacheSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tubetalk".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// YouTube Data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// API key. Falls back to `YOUTUBE_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Base URL of the Data API.
    pub base_url: String,
    /// Page size for thread and reply listings (max 100).
    pub page_size: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

impl YoutubeSettings {
    /// Resolve the API key from settings or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("YOUTUBE_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Cohere embed endpoint (default).
    #[default]
    Cohere,
    /// OpenAI embeddings.
    OpenAI,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cohere" => Ok(EmbeddingProvider::Cohere),
            "openai" => Ok(EmbeddingProvider::OpenAI),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Cohere => write!(f, "cohere"),
            EmbeddingProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (cohere, openai).
    pub provider: EmbeddingProvider,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Texts per request.
    pub batch_size: usize,
    /// Requests in flight at once. Results are always returned in input order.
    pub max_concurrent_batches: usize,
    /// Cohere API key. Falls back to `COHERE_API_KEY` when unset.
    pub cohere_api_key: Option<String>,
    /// Cohere API base URL.
    pub cohere_base_url: String,
    /// How Cohere handles inputs longer than the model limit (NONE, START, END).
    pub truncate: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Cohere,
            model: "embed-english-v3.0".to_string(),
            dimensions: 1024,
            batch_size: 96,
            max_concurrent_batches: 4,
            cohere_api_key: None,
            cohere_base_url: "https://api.cohere.ai".to_string(),
            truncate: "END".to_string(),
            timeout_secs: 60,
        }
    }
}

impl EmbeddingSettings {
    /// Resolve the Cohere API key from settings or the environment.
    pub fn resolve_cohere_api_key(&self) -> Option<String> {
        self.cohere_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("COHERE_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

/// Comment analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Number of topics to fit.
    pub num_topics: usize,
    /// Terms to report per topic.
    pub num_words: usize,
    /// Full passes over the corpus when fitting the topic model.
    pub passes: usize,
    /// Maximum inner iterations per document and pass.
    pub iterations: usize,
    /// Seed for the topic model's initial state.
    pub seed: u64,
    /// Videos with this many comments or more are refused.
    pub max_comments: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            num_topics: 4,
            num_words: 4,
            passes: 50,
            iterations: 50,
            seed: 42,
            max_comments: 500,
        }
    }
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    /// A single SQLite file holding documents and vectors.
    #[default]
    Sqlite,
    /// Process-local maps, lost on exit.
    Memory,
}

/// Document and vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Storage provider (sqlite, memory).
    pub provider: StorageProvider,
    /// Path to the SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Sqlite,
            sqlite_path: "~/.tubetalk/tubetalk.db".to_string(),
        }
    }
}

/// Question answering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSettings {
    /// Number of matching comments to return.
    pub top_k: usize,
    /// Shorter questions are rejected.
    pub min_question_chars: usize,
    /// Screen matching comments before showing them.
    pub screen_responses: bool,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_question_chars: 5,
            screen_responses: true,
        }
    }
}

/// Chat model settings used for summaries and screening.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model.
    pub model: String,
    /// Comments per cluster sent for summarization.
    pub summary_max_comments: usize,
    /// Longer comments are left out of cluster summaries.
    pub summary_max_comment_chars: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            summary_max_comments: 15,
            summary_max_comment_chars: 100,
        }
    }
}

/// Analysis cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of videos kept in memory.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TubeTalkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tubetalk")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.sqlite_path)
    }
}
