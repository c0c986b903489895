//! Pipeline orchestrator for TubeTalk.
//!
//! Coordinates the whole process from fetching comments to indexing them for
//! questions, and keeps recent analysis reports in a bounded cache.

use crate::analysis::{self, AnalysisOptions, AnalysisReport, ClusterAssignment};
use crate::cache::ReportCache;
use crate::comments::{self, extract_video_id, CommentSource, NormalizedRecord, YoutubeCommentSource};
use crate::config::{Prompts, Settings, StorageProvider};
use crate::document_store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Result, TubeTalkError};
use crate::llm::{CommentAssistant, OpenAIAssistant};
use crate::qa::{Answer, QaEngine};
use crate::vector_store::{MemoryVectorStore, SqliteVectorStore, VectorRecord, VectorStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// The main orchestrator for the TubeTalk pipeline.
pub struct Orchestrator {
    settings: Settings,
    source: Arc<dyn CommentSource>,
    embedder: Arc<dyn Embedder>,
    document_store: Arc<dyn DocumentStore>,
    vector_store: Arc<dyn VectorStore>,
    assistant: Option<Arc<dyn CommentAssistant>>,
    cache: Mutex<ReportCache>,
}

/// Result of analyzing a video.
#[derive(Debug, Clone)]
pub struct VideoAnalysis {
    pub video_id: String,
    pub report: AnalysisReport,
    /// Served from the cache without fetching.
    pub cached: bool,
}

/// A summarized cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDigest {
    pub cluster_id: usize,
    /// Number of comments in the cluster.
    pub size: usize,
    /// `None` when the cluster has no comment short enough to summarize.
    pub summary: Option<String>,
}

impl Orchestrator {
    /// Create an orchestrator with the components selected in settings.
    pub fn new(settings: Settings) -> Result<Self> {
        // Load prompts (with optional custom directory and variables)
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let source: Arc<dyn CommentSource> = Arc::new(YoutubeCommentSource::new(&settings.youtube)?);
        let embedder = create_embedder(&settings.embedding)?;
        info!(
            "Using {} embeddings ({})",
            settings.embedding.provider, settings.embedding.model
        );

        let (document_store, vector_store): (Arc<dyn DocumentStore>, Arc<dyn VectorStore>) =
            match settings.storage.provider {
                StorageProvider::Sqlite => {
                    let path = settings.sqlite_path();
                    (
                        Arc::new(SqliteDocumentStore::new(&path)?),
                        Arc::new(SqliteVectorStore::new(&path)?),
                    )
                }
                StorageProvider::Memory => (
                    Arc::new(MemoryDocumentStore::new()),
                    Arc::new(MemoryVectorStore::new()),
                ),
            };

        let assistant: Option<Arc<dyn CommentAssistant>> = if std::env::var("OPENAI_API_KEY").is_ok() {
            Some(Arc::new(
                OpenAIAssistant::new(&settings.llm.model)?.with_prompts(prompts),
            ))
        } else {
            warn!("OPENAI_API_KEY not set; cluster summaries and answer screening are disabled");
            None
        };

        Ok(Self::with_components(
            settings,
            source,
            embedder,
            document_store,
            vector_store,
            assistant,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        source: Arc<dyn CommentSource>,
        embedder: Arc<dyn Embedder>,
        document_store: Arc<dyn DocumentStore>,
        vector_store: Arc<dyn VectorStore>,
        assistant: Option<Arc<dyn CommentAssistant>>,
    ) -> Self {
        let cache = Mutex::new(ReportCache::new(settings.cache.capacity));
        Self {
            settings,
            source,
            embedder,
            document_store,
            vector_store,
            assistant,
            cache,
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether an assistant is available for summaries and screening.
    pub fn has_assistant(&self) -> bool {
        self.assistant.is_some()
    }

    /// Fetch, store, analyze and index a video's comments.
    ///
    /// A cached report is returned unless `force` is set.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn analyze_video(&self, input: &str, force: bool) -> Result<VideoAnalysis> {
        let video_id = parse_video_id(input)?;

        if !force {
            if let Some(report) = self.cached_report(&video_id)? {
                info!("Serving cached analysis for {}", video_id);
                return Ok(VideoAnalysis {
                    video_id,
                    report,
                    cached: true,
                });
            }
        }

        let threads = self.source.fetch_threads(&video_id).await?;
        let total = comments::total_comments(&threads);
        let max_comments = self.settings.analysis.max_comments;
        if total >= max_comments {
            return Err(TubeTalkError::InvalidInput(format!(
                "Video has {} comments; please choose a video with fewer than {}",
                total, max_comments
            )));
        }

        let records = comments::normalize(&threads)?;
        info!(
            "Normalized {} comments ({} replies) for {}",
            records.len(),
            records.iter().filter(|r| r.is_reply()).count(),
            video_id
        );
        self.document_store.save(&video_id, &records).await?;

        let options = AnalysisOptions::from(&self.settings.analysis);
        let run = analysis::analyze(&records, self.embedder.as_ref(), &options).await?;

        self.index_vectors(&video_id, &records, run.embeddings).await?;

        let mut cache = self.lock_cache()?;
        if let Some(evicted) = cache.put(video_id.clone(), run.report.clone()) {
            debug!("Evicted cached analysis for {}", evicted);
        }
        drop(cache);

        Ok(VideoAnalysis {
            video_id,
            report: run.report,
            cached: false,
        })
    }

    /// Replace the video's vector namespace with fresh embeddings.
    async fn index_vectors(
        &self,
        video_id: &str,
        records: &[NormalizedRecord],
        embeddings: Vec<crate::embedding::EmbeddedComment>,
    ) -> Result<usize> {
        let parents: HashMap<&str, Option<String>> = records
            .iter()
            .map(|r| (r.comment_id.as_str(), r.parent_comment_id.clone()))
            .collect();

        let vector_records: Vec<VectorRecord> = embeddings
            .into_iter()
            .map(|embedded| {
                let parent_id = parents
                    .get(embedded.comment_id.as_str())
                    .cloned()
                    .flatten();
                VectorRecord::from_embedded(embedded, parent_id)
            })
            .collect();

        self.vector_store.delete_namespace(video_id).await?;
        let count = self.vector_store.upsert(video_id, &vector_records).await?;
        info!("Indexed {} comment vectors for {}", count, video_id);
        Ok(count)
    }

    /// Summarize every non-noise cluster from its short comments.
    #[instrument(skip(self, clusters))]
    pub async fn summarize_clusters(
        &self,
        video_id: &str,
        clusters: &ClusterAssignment,
    ) -> Result<Vec<ClusterDigest>> {
        let assistant = self.assistant.as_ref().ok_or_else(|| {
            TubeTalkError::Config("Cluster summaries need OPENAI_API_KEY".to_string())
        })?;

        let max_chars = self.settings.llm.summary_max_comment_chars;
        let max_comments = self.settings.llm.summary_max_comments;

        let mut digests = Vec::new();
        for (cluster_id, ids) in clusters.clusters() {
            let records = self.document_store.get_by_ids(video_id, ids).await?;
            let texts: Vec<String> = records
                .into_iter()
                .map(|r| r.text)
                .filter(|text| text.chars().count() < max_chars)
                .take(max_comments)
                .collect();

            let summary = if texts.is_empty() {
                None
            } else {
                Some(assistant.summarize(&texts).await?)
            };

            digests.push(ClusterDigest {
                cluster_id,
                size: ids.len(),
                summary,
            });
        }

        Ok(digests)
    }

    /// Answer a question from an analyzed video's comments.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn ask(&self, input: &str, question: &str) -> Result<Vec<Answer>> {
        let video_id = parse_video_id(input)?;

        if self.vector_store.count(&video_id).await? == 0 {
            return Err(TubeTalkError::InvalidInput(format!(
                "Video {} has not been analyzed yet. Run 'tubetalk analyze' first",
                video_id
            )));
        }

        let mut engine = QaEngine::new(
            self.embedder.clone(),
            self.vector_store.clone(),
            self.document_store.clone(),
        )
        .with_top_k(self.settings.qa.top_k)
        .with_min_question_chars(self.settings.qa.min_question_chars);

        if self.settings.qa.screen_responses {
            if let Some(assistant) = &self.assistant {
                engine = engine.with_assistant(assistant.clone());
            }
        }

        engine.ask(&video_id, question).await
    }

    /// A cached report for the video, if present.
    pub fn cached_report(&self, video_id: &str) -> Result<Option<AnalysisReport>> {
        Ok(self.lock_cache()?.get(video_id))
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, ReportCache>> {
        self.cache
            .lock()
            .map_err(|e| TubeTalkError::Task(format!("Analysis cache lock poisoned: {}", e)))
    }
}

fn parse_video_id(input: &str) -> Result<String> {
    extract_video_id(input).ok_or_else(|| {
        TubeTalkError::InvalidInput(format!("Could not parse a YouTube video from: {}", input))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::two_subject_records;
    use crate::comments::RawComment;
    use crate::embedding::testing::StubEmbedder;
    use crate::qa::testing::StubAssistant;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VIDEO: &str = "dQw4w9WgXcQ";

    struct StubSource {
        threads: Vec<RawComment>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommentSource for StubSource {
        async fn fetch_threads(&self, _video_id: &str) -> Result<Vec<RawComment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.threads.clone())
        }
    }

    fn threads() -> Vec<RawComment> {
        let records = two_subject_records();
        let mut threads: Vec<RawComment> = records
            .iter()
            .map(|r| RawComment::new(r.comment_id.clone(), r.author.clone(), r.text.clone()))
            .collect();
        threads[0] = threads[0]
            .clone()
            .with_reply(RawComment::new("c0.r1", "fan", "xylophone encore please"));
        threads
    }

    fn orchestrator(settings: Settings) -> (Orchestrator, Arc<StubSource>) {
        let source = Arc::new(StubSource {
            threads: threads(),
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::with_components(
            settings,
            source.clone(),
            Arc::new(StubEmbedder),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryVectorStore::new()),
            Some(Arc::new(StubAssistant)),
        );
        (orchestrator, source)
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.analysis.num_topics = 2;
        settings.analysis.num_words = 3;
        settings
    }

    #[tokio::test]
    async fn test_analyze_video_end_to_end() {
        let (orchestrator, source) = orchestrator(settings());
        let url = format!("https://www.youtube.com/watch?v={}", VIDEO);

        let analysis = orchestrator.analyze_video(&url, false).await.unwrap();
        assert_eq!(analysis.video_id, VIDEO);
        assert!(!analysis.cached);
        assert_eq!(analysis.report.comment_count, 9);
        assert_eq!(analysis.report.clusters.len(), 9);
        assert_eq!(analysis.report.topics.len(), 2);

        assert_eq!(orchestrator.vector_store.count(VIDEO).await.unwrap(), 9);
        assert_eq!(orchestrator.document_store.count(VIDEO).await.unwrap(), 9);

        let again = orchestrator.analyze_video(VIDEO, false).await.unwrap();
        assert!(again.cached);
        assert_eq!(again.report, analysis.report);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        orchestrator.analyze_video(VIDEO, true).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_small_video_still_clusters_and_caches() {
        let mut settings = settings();
        settings.analysis.num_topics = 20;
        let (orchestrator, _) = orchestrator(settings);

        let analysis = orchestrator.analyze_video(VIDEO, false).await.unwrap();
        assert!(analysis.report.topics.is_empty());
        assert!(analysis.report.topics_error.is_some());
        assert_eq!(analysis.report.clusters.len(), 9);
        assert_eq!(orchestrator.vector_store.count(VIDEO).await.unwrap(), 9);
        assert!(orchestrator.cached_report(VIDEO).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reply_parent_is_indexed() {
        let (orchestrator, _) = orchestrator(settings());
        orchestrator.analyze_video(VIDEO, false).await.unwrap();

        let hits = orchestrator
            .vector_store
            .query(VIDEO, &crate::vector_store::VectorQuery::by_id("r1", 1))
            .await
            .unwrap();
        assert_eq!(hits[0].id, "r1");
        assert_eq!(hits[0].parent_id.as_deref(), Some("c0"));
    }

    #[tokio::test]
    async fn test_refuses_large_videos() {
        let mut settings = settings();
        settings.analysis.max_comments = 9;
        let (orchestrator, _) = orchestrator(settings);

        let err = orchestrator.analyze_video(VIDEO, false).await.unwrap_err();
        assert!(matches!(err, TubeTalkError::InvalidInput(_)));
        assert_eq!(orchestrator.document_store.count(VIDEO).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_video_input() {
        let (orchestrator, _) = orchestrator(settings());
        assert!(matches!(
            orchestrator.analyze_video("not a video", false).await,
            Err(TubeTalkError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_summarize_clusters() {
        let (orchestrator, _) = orchestrator(settings());
        let analysis = orchestrator.analyze_video(VIDEO, false).await.unwrap();

        let digests = orchestrator
            .summarize_clusters(VIDEO, &analysis.report.clusters)
            .await
            .unwrap();

        assert_eq!(digests.len(), analysis.report.clusters.cluster_count());
        let total: usize = digests.iter().map(|d| d.size).sum();
        assert_eq!(total, 9 - analysis.report.clusters.noise().len());
        assert!(digests.iter().all(|d| d.summary.is_some()));
    }

    #[tokio::test]
    async fn test_ask_requires_analysis_then_answers() {
        let (orchestrator, _) = orchestrator(settings());
        assert!(matches!(
            orchestrator.ask(VIDEO, "who played the xylophone?").await,
            Err(TubeTalkError::InvalidInput(_))
        ));

        orchestrator.analyze_video(VIDEO, false).await.unwrap();
        let answers = orchestrator
            .ask(VIDEO, "xylophone, who played it?")
            .await
            .unwrap();

        assert_eq!(answers.len(), 8);
        assert!(answers.iter().all(|a| a.verdict.is_some()));
    }

    #[tokio::test]
    async fn test_cache_capacity_is_respected() {
        let mut settings = settings();
        settings.cache.capacity = 1;
        let (orchestrator, _) = orchestrator(settings);

        orchestrator.analyze_video(VIDEO, false).await.unwrap();
        orchestrator.analyze_video("aaaaaaaaaaa", false).await.unwrap();

        assert!(orchestrator.cached_report(VIDEO).unwrap().is_none());
        assert!(orchestrator.cached_report("aaaaaaaaaaa").unwrap().is_some());
    }
}
