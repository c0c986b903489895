//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Every query scans its namespace, which is fine at the size of one video's
//! comment section.

use super::{rank, QueryTarget, VectorMatch, VectorQuery, VectorRecord, VectorStore, UPSERT_BATCH_SIZE};
use crate::error::{Result, TubeTalkError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vectors (
        namespace TEXT NOT NULL,
        id TEXT NOT NULL,
        embedding BLOB NOT NULL,
        parent_id TEXT,
        PRIMARY KEY (namespace, id)
    );
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
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

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        let conn = self.lock()?;

        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let tx = conn.unchecked_transaction()?;

            for record in batch {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO vectors (namespace, id, embedding, parent_id)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![
                        namespace,
                        record.id,
                        Self::embedding_to_bytes(&record.values),
                        record.parent_id,
                    ],
                )?;
            }

            tx.commit()?;
        }

        info!("Upserted {} vectors into {}", records.len(), namespace);
        Ok(records.len())
    }

    #[instrument(skip(self, query), fields(top_k = query.top_k))]
    async fn query(&self, namespace: &str, query: &VectorQuery) -> Result<Vec<VectorMatch>> {
        let target = query.target()?;
        let conn = self.lock()?;

        let stored;
        let vector: &[f32] = match target {
            QueryTarget::Vector(vector) => vector,
            QueryTarget::Id(id) => {
                let bytes: Option<Vec<u8>> = conn
                    .query_row(
                        "SELECT embedding FROM vectors WHERE namespace = ?1 AND id = ?2",
                        params![namespace, id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match bytes {
                    Some(bytes) => {
                        stored = Self::bytes_to_embedding(&bytes);
                        &stored
                    }
                    None => return Ok(Vec::new()),
                }
            }
        };

        let mut stmt =
            conn.prepare("SELECT id, embedding, parent_id FROM vectors WHERE namespace = ?1")?;
        let records = stmt
            .query_map(params![namespace], |row| {
                let embedding_bytes: Vec<u8> = row.get(1)?;
                Ok(VectorRecord {
                    id: row.get(0)?,
                    values: Self::bytes_to_embedding(&embedding_bytes),
                    parent_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let results = rank(&records, vector, query.top_k);
        debug!("Found {} matching vectors", results.len());
        Ok(results)
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vectors WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM vectors WHERE namespace = ?1", params![namespace])?;

        info!("Deleted {} vectors from {}", deleted, namespace);
        Ok(deleted)
    }
}
