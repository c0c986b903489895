//! TubeTalk - YouTube comment analysis
//!
//! A CLI tool and library for finding out what people say under a YouTube video.
//!
//! # Overview
//!
//! TubeTalk allows you to:
//! - Fetch every comment thread of a video, replies included
//! - Model the comments' topics with LDA
//! - Group similar comments by clustering their embeddings
//! - Summarize each cluster with a language model
//! - Ask questions and get the comments that answer them best
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `comments` - Comment fetching and normalization
//! - `analysis` - Text preprocessing, topic modeling and clustering
//! - `embedding` - Embedding generation
//! - `document_store` - Storage for normalized comments
//! - `vector_store` - Vector database abstraction
//! - `llm` - Cluster summaries and answer screening
//! - `qa` - Question answering over stored comments
//! - `cache` - Bounded LRU cache for analysis reports
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use tubetalk::config::Settings;
//! use tubetalk::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let analysis = orchestrator.analyze_video("dQw4w9WgXcQ", false).await?;
//!     println!(
//!         "{} comments, {} clusters",
//!         analysis.report.comment_count,
//!         analysis.report.clusters.cluster_count()
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod comments;
pub mod config;
pub mod document_store;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod qa;
pub mod vector_store;

pub use error::{Result, TubeTalkError};
