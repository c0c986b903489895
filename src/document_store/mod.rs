//! Storage of normalized comment records, one collection per video.

mod memory;
mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use crate::comments::NormalizedRecord;
use crate::error::Result;
use async_trait::async_trait;

/// Records are written in transactions of at most this many.
pub const SAVE_BATCH_SIZE: usize = 500;

/// Trait for document store implementations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Save records keyed by comment id; a later write of the same id replaces
    /// the earlier one. Returns the number of records written.
    async fn save(&self, collection: &str, records: &[NormalizedRecord]) -> Result<usize>;

    /// Fetch records in the order of `ids`. Unknown ids are skipped.
    async fn get_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<NormalizedRecord>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn record(id: &str, text: &str) -> NormalizedRecord {
        NormalizedRecord {
            comment_id: id.to_string(),
            author: format!("author of {}", id),
            text: text.to_string(),
            parent_comment_id: None,
            like_count: 1,
            published_at: None,
        }
    }

    pub async fn exercise_store(store: &dyn DocumentStore) {
        let mut reply = record("r1", "a reply");
        reply.parent_comment_id = Some("t1".to_string());
        reply.published_at = Some(
            chrono::DateTime::parse_from_rfc3339("2023-05-06T07:08:09Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
        );

        let written = store
            .save("video1", &[record("t1", "first"), reply.clone(), record("t2", "second")])
            .await
            .unwrap();
        assert_eq!(written, 3);
        store.save("video2", &[record("t1", "other video")]).await.unwrap();

        assert_eq!(store.count("video1").await.unwrap(), 3);
        assert_eq!(store.count("video2").await.unwrap(), 1);
        assert_eq!(store.count("empty").await.unwrap(), 0);

        let ids = vec!["t2".to_string(), "missing".to_string(), "r1".to_string()];
        let fetched = store.get_by_ids("video1", &ids).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].text, "second");
        assert_eq!(fetched[1], reply);

        // Last write wins.
        store.save("video1", &[record("t1", "edited")]).await.unwrap();
        let fetched = store.get_by_ids("video1", &["t1".to_string()]).await.unwrap();
        assert_eq!(fetched[0].text, "edited");
        assert_eq!(store.count("video1").await.unwrap(), 3);

        let other = store.get_by_ids("video2", &["t1".to_string()]).await.unwrap();
        assert_eq!(other[0].text, "other video");
    }
}
