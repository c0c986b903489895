//! CLI output formatting utilities.

use crate::analysis::Topic;
use crate::orchestrator::ClusterDigest;
use crate::qa::Answer;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print topics with each term's share of its topic's reported terms.
    pub fn topics(topics: &BTreeMap<usize, Topic>) {
        for (topic_id, topic) in topics {
            let shares = topic_shares(topic);
            let terms: Vec<String> = topic
                .terms
                .iter()
                .zip(&shares)
                .map(|(term, share)| format!("{} {:.0}%", style(&term.term).bold(), share * 100.0))
                .collect();
            println!("  {} Topic {}: {}", style("*").cyan(), topic_id, terms.join(", "));
        }
    }

    /// Print a cluster table.
    pub fn clusters(digests: &[ClusterDigest], noise: usize) {
        println!(
            "  {:>7}  {:>5}  {}",
            style("Cluster").dim(),
            style("Size").dim(),
            style("Summary").dim()
        );
        for digest in digests {
            let summary = digest.summary.as_deref().unwrap_or("(no short comments to summarize)");
            println!("  {:>7}  {:>5}  {}", digest.cluster_id, digest.size, summary);
        }
        if noise > 0 {
            println!("  {}", style(format!("{} comments fit no cluster", noise)).dim());
        }
    }

    /// Print an answer comment.
    pub fn answer(answer: &Answer) {
        let record = &answer.record;
        let text = if answer.is_hidden() {
            style("< This response is not appropriate and has been hidden >".to_string())
                .dim()
                .italic()
        } else {
            style(content_preview(&record.text, 300))
        };

        println!(
            "\n{} {} (score: {:.2}, {} likes)",
            style(">>").green(),
            style(&record.author).bold(),
            answer.score,
            style(record.like_count).green()
        );
        println!("   {}", text);
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Softmax over a topic's term weights, so shares are positive and sum to 1.
pub fn topic_shares(topic: &Topic) -> Vec<f64> {
    let max = topic
        .terms
        .iter()
        .map(|t| t.weight)
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = topic.terms.iter().map(|t| (t.weight - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content,
    }
}
