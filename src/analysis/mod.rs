//! Comment analysis: topic modeling and embedding clustering.
//!
//! The two paths are independent. [`analyze`] runs the CPU-bound topic path
//! on the blocking pool while the embedding and clustering path runs on the
//! calling task, then joins both.

pub mod cluster;
pub mod preprocess;
pub mod topics;

pub use cluster::{ClusterAssignment, ClusterEngine, ClusterLabel, ClusterParams};
pub use preprocess::Preprocessor;
pub use topics::{Dictionary, LdaConfig, Topic, TopicModel, TopicTerm};

use crate::comments::NormalizedRecord;
use crate::config::AnalysisSettings;
use crate::embedding::{embed_comments, EmbeddedComment, Embedder};
use crate::error::{Result, TubeTalkError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Topic and cluster parameters for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub num_topics: usize,
    pub num_words: usize,
    pub lda: LdaConfig,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            num_topics: 4,
            num_words: 4,
            lda: LdaConfig::default(),
        }
    }
}

impl From<&AnalysisSettings> for AnalysisOptions {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            num_topics: settings.num_topics,
            num_words: settings.num_words,
            lda: LdaConfig {
                passes: settings.passes,
                iterations: settings.iterations,
                seed: settings.seed,
                ..LdaConfig::default()
            },
        }
    }
}

/// What an analysis found in a video's comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub comment_count: usize,
    pub topics: BTreeMap<usize, Topic>,
    /// Why `topics` is empty when the corpus could not support a topic model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics_error: Option<String>,
    pub clusters: ClusterAssignment,
}

/// A finished analysis with the embeddings it computed along the way.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub report: AnalysisReport,
    pub embeddings: Vec<EmbeddedComment>,
}

/// Preprocess `texts`, fit a topic model and extract its topics.
pub fn model_topics<S: AsRef<str>>(
    texts: &[S],
    num_topics: usize,
    num_words: usize,
) -> Result<BTreeMap<usize, Topic>> {
    let options = AnalysisOptions {
        num_topics,
        num_words,
        ..Default::default()
    };
    model_topics_with(texts, &options)
}

/// Like [`model_topics`], with explicit fitting parameters.
pub fn model_topics_with<S: AsRef<str>>(
    texts: &[S],
    options: &AnalysisOptions,
) -> Result<BTreeMap<usize, Topic>> {
    let tokens = Preprocessor::new().process(texts);
    let mut model = TopicModel::new(options.lda.clone());
    model.build(&tokens);
    model.fit(options.num_topics)?;
    model.extract(options.num_words)
}

/// Run both analysis paths over `records`.
///
/// A corpus too small or too empty for the requested topic count abandons
/// topic analysis only: the report carries the reason in `topics_error` and
/// still holds the clusters. Every other failure fails the whole run.
#[instrument(skip_all, fields(comments = records.len()))]
pub async fn analyze(
    records: &[NormalizedRecord],
    embedder: &dyn Embedder,
    options: &AnalysisOptions,
) -> Result<AnalysisRun> {
    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
    let topic_options = options.clone();
    let topic_task =
        tokio::task::spawn_blocking(move || model_topics_with(&texts, &topic_options));

    let cluster_path = async {
        let embeddings = embed_comments(embedder, records).await?;
        let clusters = ClusterEngine::new().analyze_pairs(&embeddings)?;
        Ok::<_, TubeTalkError>((embeddings, clusters))
    };

    let (topics, clustered) = tokio::join!(topic_task, cluster_path);
    let topics = topics.map_err(|e| TubeTalkError::Task(format!("topic modeling: {}", e)))?;
    let (embeddings, clusters) = clustered?;

    let (topics, topics_error) = match topics {
        Ok(topics) => (topics, None),
        Err(TubeTalkError::DegenerateCorpus(reason)) => {
            warn!("Skipping topic analysis: {}", reason);
            (BTreeMap::new(), Some(reason))
        }
        Err(e) => return Err(e),
    };

    info!(
        "Found {} topics and {} clusters",
        topics.len(),
        clusters.cluster_count()
    );

    Ok(AnalysisRun {
        report: AnalysisReport {
            comment_count: records.len(),
            topics,
            topics_error,
            clusters,
        },
        embeddings,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::comments::NormalizedRecord;

    /// Comments about two unrelated subjects; texts about the first start
    /// with `x` so the stub embedder separates them.
    pub fn two_subject_records() -> Vec<NormalizedRecord> {
        let texts = [
            "xylophone melody sounded wonderful",
            "xylophone solo melody was wonderful",
            "xylophone player nailed the melody",
            "xylophone tuning sounded perfect",
            "drummer rhythm kept everything tight",
            "drummer tempo rhythm was solid",
            "drummer fills rhythm sounded heavy",
            "drummer groove tempo felt amazing",
        ];
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| NormalizedRecord {
                comment_id: format!("c{}", i),
                author: "viewer".to_string(),
                text: text.to_string(),
                parent_comment_id: None,
                like_count: i as u64,
                published_at: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::two_subject_records;
    use super::*;
    use crate::embedding::testing::StubEmbedder;

    #[test]
    fn test_model_topics_shape() {
        let texts: Vec<String> = two_subject_records().into_iter().map(|r| r.text).collect();
        let topics = model_topics(&texts, 2, 3).unwrap();

        assert_eq!(topics.len(), 2);
        assert!(topics.values().all(|t| t.terms.len() == 3));
    }

    #[test]
    fn test_model_topics_degenerate() {
        let texts = vec!["the and of", "123 456"];
        assert!(matches!(
            model_topics(&texts, 1, 3),
            Err(TubeTalkError::DegenerateCorpus(_))
        ));
    }

    #[tokio::test]
    async fn test_analyze_runs_both_paths() {
        let records = two_subject_records();
        let options = AnalysisOptions {
            num_topics: 2,
            num_words: 3,
            ..Default::default()
        };

        let run = analyze(&records, &StubEmbedder, &options).await.unwrap();

        assert_eq!(run.report.comment_count, 8);
        assert_eq!(run.report.topics.len(), 2);
        assert_eq!(run.report.clusters.len(), 8);
        assert_eq!(run.report.clusters.cluster_count(), 2);
        assert_eq!(run.embeddings.len(), 8);
        assert_eq!(run.embeddings[3].comment_id, "c3");
    }

    #[tokio::test]
    async fn test_too_many_topics_keeps_clusters() {
        let records = two_subject_records();
        let options = AnalysisOptions {
            num_topics: 50,
            ..Default::default()
        };

        let run = analyze(&records, &StubEmbedder, &options).await.unwrap();
        assert!(run.report.topics.is_empty());
        assert!(run.report.topics_error.is_some());
        assert_eq!(run.report.clusters.len(), 8);
        assert_eq!(run.report.clusters.cluster_count(), 2);
    }

    #[tokio::test]
    async fn test_no_comments_is_an_empty_report() {
        let run = analyze(&[], &StubEmbedder, &AnalysisOptions::default())
            .await
            .unwrap();

        assert_eq!(run.report.comment_count, 0);
        assert!(run.report.topics.is_empty());
        assert!(run.report.topics_error.is_some());
        assert!(run.report.clusters.is_empty());
        assert!(run.embeddings.is_empty());
    }

    #[tokio::test]
    async fn test_fewer_comments_than_topics() {
        let records: Vec<NormalizedRecord> = two_subject_records().into_iter().take(3).collect();

        let run = analyze(&records, &StubEmbedder, &AnalysisOptions::default())
            .await
            .unwrap();

        let reason = run.report.topics_error.as_deref().unwrap();
        assert!(reason.contains("4 topics"), "{}", reason);
        assert!(run.report.topics.is_empty());
        assert_eq!(run.report.clusters.len(), 3);
        assert_eq!(run.embeddings.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_topic_count_still_fails() {
        let options = AnalysisOptions {
            num_topics: 0,
            ..Default::default()
        };
        assert!(matches!(
            analyze(&two_subject_records(), &StubEmbedder, &options).await,
            Err(TubeTalkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_report_json_omits_missing_topic_error() {
        let report = AnalysisReport {
            comment_count: 0,
            topics: BTreeMap::new(),
            topics_error: None,
            clusters: ClusterAssignment::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("topics_error").is_none());
        assert_eq!(serde_json::from_value::<AnalysisReport>(json).unwrap(), report);
    }

    #[test]
    fn test_options_from_settings() {
        let settings = AnalysisSettings {
            num_topics: 6,
            seed: 7,
            ..Default::default()
        };
        let options = AnalysisOptions::from(&settings);
        assert_eq!(options.num_topics, 6);
        assert_eq!(options.lda.seed, 7);
        assert_eq!(options.lda.passes, settings.passes);
    }
}
