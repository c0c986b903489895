//! Configuration module for TubeTalk.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, ScreeningPrompts, SummaryPrompts};
pub use settings::{
    AnalysisSettings, CacheSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings,
    LlmSettings, PromptSettings, QaSettings, Settings, StorageProvider, StorageSettings,
    YoutubeSettings,
};
