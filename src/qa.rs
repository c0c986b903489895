//! Question answering over a video's comments.
//!
//! A question is embedded, matched against the video's comment vectors, and
//! the matching comments are screened before they are shown. Screened-out
//! answers stay in the result, marked hidden.

use crate::comments::NormalizedRecord;
use crate::document_store::DocumentStore;
use crate::embedding::Embedder;
use crate::error::{Result, TubeTalkError};
use crate::llm::{CommentAssistant, Verdict};
use crate::vector_store::{VectorQuery, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// A comment returned as an answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub record: NormalizedRecord,
    /// Cosine similarity to the question.
    pub score: f32,
    /// `None` when screening is disabled.
    pub verdict: Option<Verdict>,
}

impl Answer {
    pub fn is_hidden(&self) -> bool {
        self.verdict.is_some_and(|v| !v.is_displayable())
    }
}

/// Answers questions from stored comments.
pub struct QaEngine {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    document_store: Arc<dyn DocumentStore>,
    assistant: Option<Arc<dyn CommentAssistant>>,
    top_k: usize,
    min_question_chars: usize,
}

impl QaEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        document_store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            document_store,
            assistant: None,
            top_k: 8,
            min_question_chars: 5,
        }
    }

    /// Screen answers with this assistant.
    pub fn with_assistant(mut self, assistant: Arc<dyn CommentAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_question_chars(mut self, min_chars: usize) -> Self {
        self.min_question_chars = min_chars;
        self
    }

    /// Find the comments that best answer `question`, best first.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn ask(&self, video_id: &str, question: &str) -> Result<Vec<Answer>> {
        let question = question.trim();
        if question.chars().count() < self.min_question_chars {
            return Err(TubeTalkError::InvalidInput(format!(
                "Question should have at least {} characters",
                self.min_question_chars
            )));
        }

        let query_vector = self.embedder.embed(question).await?;
        let matches = self
            .vector_store
            .query(video_id, &VectorQuery::by_vector(query_vector, self.top_k))
            .await?;

        let ids: Vec<String> = matches.iter().map(|m| m.id.clone()).collect();
        let scores: HashMap<&str, f32> = matches.iter().map(|m| (m.id.as_str(), m.score)).collect();
        let records = self.document_store.get_by_ids(video_id, &ids).await?;

        let verdicts = match &self.assistant {
            Some(assistant) => {
                let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
                let verdicts = assistant.screen(&texts).await?;
                if verdicts.len() != records.len() {
                    return Err(TubeTalkError::ContractMismatch(format!(
                        "{} verdicts for {} answers",
                        verdicts.len(),
                        records.len()
                    )));
                }
                verdicts.into_iter().map(Some).collect()
            }
            None => vec![None; records.len()],
        };

        let answers: Vec<Answer> = records
            .into_iter()
            .zip(verdicts)
            .map(|(record, verdict)| Answer {
                score: scores.get(record.comment_id.as_str()).copied().unwrap_or(0.0),
                record,
                verdict,
            })
            .collect();

        info!(
            "Found {} answers, {} hidden",
            answers.len(),
            answers.iter().filter(|a| a.is_hidden()).count()
        );
        Ok(answers)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;

    /// Labels comments containing "dumb" inappropriate and summarizes by
    /// returning the first comment.
    pub struct StubAssistant;

    #[async_trait]
    impl CommentAssistant for StubAssistant {
        async fn summarize(&self, comments: &[String]) -> Result<String> {
            Ok(comments.first().cloned().unwrap_or_default())
        }

        async fn screen(&self, comments: &[String]) -> Result<Vec<Verdict>> {
            Ok(comments
                .iter()
                .map(|c| {
                    if c.contains("dumb") {
                        Verdict::Inappropriate
                    } else {
                        Verdict::Appropriate
                    }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubAssistant;
    use super::*;
    use crate::document_store::MemoryDocumentStore;
    use crate::embedding::testing::{stub_vector, StubEmbedder};
    use crate::vector_store::{MemoryVectorStore, VectorRecord};

    fn record(id: &str, text: &str) -> NormalizedRecord {
        NormalizedRecord {
            comment_id: id.to_string(),
            author: "someone".to_string(),
            text: text.to_string(),
            parent_comment_id: None,
            like_count: 0,
            published_at: None,
        }
    }

    async fn engine() -> QaEngine {
        let records = vec![
            record("c1", "xylophone solo was great"),
            record("c2", "xenon lights are dumb"),
            record("c3", "the drummer carried"),
        ];

        let documents = Arc::new(MemoryDocumentStore::new());
        documents.save("vid", &records).await.unwrap();

        let vectors = Arc::new(MemoryVectorStore::new());
        let vector_records: Vec<VectorRecord> = records
            .iter()
            .map(|r| VectorRecord {
                id: r.comment_id.clone(),
                values: stub_vector(&r.text),
                parent_id: None,
            })
            .collect();
        vectors.upsert("vid", &vector_records).await.unwrap();

        QaEngine::new(Arc::new(StubEmbedder), vectors, documents).with_top_k(2)
    }

    #[tokio::test]
    async fn test_short_question_rejected() {
        let engine = engine().await;
        assert!(matches!(
            engine.ask("vid", " why ").await,
            Err(TubeTalkError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_answers_without_screening() {
        let engine = engine().await;
        let answers = engine.ask("vid", "xylophone anyone?").await.unwrap();

        assert_eq!(answers.len(), 2);
        let ids: Vec<&str> = answers.iter().map(|a| a.record.comment_id.as_str()).collect();
        assert!(ids.contains(&"c1") && ids.contains(&"c2"));
        assert!(answers.iter().all(|a| a.verdict.is_none() && !a.is_hidden()));
        assert!(answers[0].score >= answers[1].score);
    }

    #[tokio::test]
    async fn test_screening_marks_hidden_answers() {
        let engine = engine().await.with_assistant(Arc::new(StubAssistant));
        let answers = engine.ask("vid", "xylophone anyone?").await.unwrap();

        assert_eq!(answers.len(), 2);
        let hidden: Vec<&str> = answers
            .iter()
            .filter(|a| a.is_hidden())
            .map(|a| a.record.comment_id.as_str())
            .collect();
        assert_eq!(hidden, vec!["c2"]);
    }

    #[tokio::test]
    async fn test_unknown_video_has_no_answers() {
        let engine = engine().await;
        assert!(engine.ask("other", "anything at all").await.unwrap().is_empty());
    }
}
