//! Error types for TubeTalk.

use thiserror::Error;

/// Library-level error type for TubeTalk operations.
#[derive(Error, Debug)]
pub enum TubeTalkError {
    /// A raw comment is missing data every later stage depends on.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Two inputs that must line up (or be mutually exclusive) do not.
    #[error("Contract mismatch: {0}")]
    ContractMismatch(String),

    /// The corpus cannot support the requested topic model.
    #[error("Degenerate corpus: {0}")]
    DegenerateCorpus(String),

    /// A network collaborator failed or timed out.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl From<reqwest::Error> for TubeTalkError {
    fn from(err: reqwest::Error) -> Self {
        TubeTalkError::UpstreamUnavailable(err.to_string())
    }
}

/// Result type alias for TubeTalk operations.
pub type Result<T> = std::result::Result<T, TubeTalkError>;
