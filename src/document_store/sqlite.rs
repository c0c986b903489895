//! SQLite-backed document store.

use super::{DocumentStore, SAVE_BATCH_SIZE};
use crate::comments::NormalizedRecord;
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS comments (
        collection TEXT NOT NULL,
        comment_id TEXT NOT NULL,
        author TEXT NOT NULL,
        text TEXT NOT NULL,
        parent_comment_id TEXT,
        like_count INTEGER NOT NULL,
        published_at TEXT,
        PRIMARY KEY (collection, comment_id)
    );
"#;

/// SQLite-based document store.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite document store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TubeTalkError::UpstreamUnavailable(format!("Failed to acquire lock: {}", e))
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<NormalizedRecord> {
        let published_at: Option<String> = row.get(5)?;
        let like_count: i64 = row.get(4)?;

        Ok(NormalizedRecord {
            comment_id: row.get(0)?,
            author: row.get(1)?,
            text: row.get(2)?,
            parent_comment_id: row.get(3)?,
            like_count: like_count.max(0) as u64,
            published_at: published_at.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn save(&self, collection: &str, records: &[NormalizedRecord]) -> Result<usize> {
        let conn = self.lock()?;

        for batch in records.chunks(SAVE_BATCH_SIZE) {
            let tx = conn.unchecked_transaction()?;

            for record in batch {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO comments
                    (collection, comment_id, author, text, parent_comment_id, like_count, published_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        collection,
                        record.comment_id,
                        record.author,
                        record.text,
                        record.parent_comment_id,
                        record.like_count as i64,
                        record.published_at.map(|dt| dt.to_rfc3339()),
                    ],
                )?;
            }

            tx.commit()?;
        }

        info!("Saved {} comments to {}", records.len(), collection);
        Ok(records.len())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<NormalizedRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT comment_id, author, text, parent_comment_id, like_count, published_at
            FROM comments
            WHERE collection = ?1 AND comment_id = ?2
            "#,
        )?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = stmt
                .query_row(params![collection, id], Self::row_to_record)
                .optional()?
            {
                records.push(record);
            }
        }

        debug!("Found {} of {} comments", records.len(), ids.len());
        Ok(records)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::testing::{exercise_store, record};

    #[tokio::test]
    async fn test_sqlite_document_store() {
        exercise_store(&SqliteDocumentStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_large_save_spans_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteDocumentStore::new(&dir.path().join("docs.db")).unwrap();

        let records: Vec<NormalizedRecord> = (0..1200)
            .map(|i| record(&format!("c{}", i), "text"))
            .collect();
        assert_eq!(store.save("video", &records).await.unwrap(), 1200);
        assert_eq!(store.count("video").await.unwrap(), 1200);
    }
}
