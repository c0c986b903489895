//! Analyze command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{ClusterDigest, Orchestrator};
use anyhow::Result;

/// Run the analyze command.
pub async fn run_analyze(
    input: &str,
    force: bool,
    no_summaries: bool,
    topics: Option<usize>,
    json: bool,
    mut settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Analyze, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubetalk doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(num_topics) = topics {
        settings.analysis.num_topics = num_topics;
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Analyzing video comments...");
    let analysis = match orchestrator.analyze_video(input, force).await {
        Ok(analysis) => {
            spinner.finish_and_clear();
            analysis
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Analysis failed: {}", e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis.report)?);
        return Ok(());
    }

    let report = &analysis.report;
    Output::header(&format!("Video {}", analysis.video_id));
    Output::kv("Comments", &report.comment_count.to_string());
    Output::kv("Clusters", &report.clusters.cluster_count().to_string());
    if analysis.cached {
        Output::kv("Source", "cached analysis (use --force to refresh)");
    }

    Output::header("Topics");
    match &report.topics_error {
        Some(reason) => Output::warning(&format!("No topics for this video: {}", reason)),
        None => Output::topics(&report.topics),
    }

    let digests = if no_summaries || !orchestrator.has_assistant() {
        if !no_summaries {
            Output::warning("Set OPENAI_API_KEY to summarize clusters.");
        }
        report
            .clusters
            .clusters()
            .map(|(cluster_id, ids)| ClusterDigest {
                cluster_id,
                size: ids.len(),
                summary: None,
            })
            .collect()
    } else {
        let spinner = Output::spinner("Summarizing clusters...");
        let digests = orchestrator
            .summarize_clusters(&analysis.video_id, &report.clusters)
            .await;
        spinner.finish_and_clear();
        digests?
    };

    Output::header("Comment clusters");
    Output::clusters(&digests, report.clusters.noise().len());

    Output::success(&format!(
        "Ask questions with: tubetalk ask {} \"...\"",
        analysis.video_id
    ));
    Ok(())
}
