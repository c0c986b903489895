//! CLI module for TubeTalk.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{topic_shares, Output};

use clap::{Parser, Subcommand};

/// TubeTalk - see what people are talking about under a YouTube video
///
/// Fetches a video's comments, finds their topics and clusters, and answers
/// questions from them.
#[derive(Parser, Debug)]
#[command(name = "tubetalk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a video's comments: topics, clusters and cluster summaries
    Analyze {
        /// YouTube URL or video ID
        input: String,

        /// Re-fetch and re-analyze even if a cached analysis exists
        #[arg(short, long)]
        force: bool,

        /// Skip cluster summaries
        #[arg(long)]
        no_summaries: bool,

        /// Number of topics (overrides config)
        #[arg(short = 't', long)]
        topics: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a question answered by the video's comments
    Ask {
        /// YouTube URL or video ID (must have been analyzed)
        input: String,

        /// The question to ask
        question: String,

        /// Maximum number of answers
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Check configuration and credentials
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
