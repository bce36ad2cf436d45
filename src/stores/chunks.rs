//! SQLite-backed storage for embedded license-text passages.
//!
//! Embeddings are stored as JSON arrays next to the chunk text and scored
//! in process with cosine similarity. The corpus is a few thousand chunks
//! at most, so a full scan per query is the honest implementation; the
//! [`ChunkStore`] trait keeps the door open for an ANN-backed engine.

use async_trait::async_trait;
use std::path::Path;
use tokio_rusqlite::Connection;

use super::ChunkStore;
use crate::embeddings::cosine_similarity;
use crate::model::ChunkRecord;
use crate::types::LicenseerError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id          TEXT PRIMARY KEY,
    spdx_id     TEXT NOT NULL,
    chunk_index TEXT NOT NULL,
    content     TEXT NOT NULL,
    metadata    TEXT NOT NULL,
    embedding   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_spdx ON chunks(spdx_id);
";

/// Chunk store over one SQLite database. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
}

impl SqliteChunkStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LicenseerError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| LicenseerError::Storage(err.to_string()))?;
        Ok(Self { conn })
    }
}

fn decode_row(
    id: String,
    spdx_id: String,
    chunk_index: String,
    content: String,
    metadata: String,
    embedding: String,
) -> (ChunkRecord, Vec<f32>) {
    let vector: Vec<f32> = serde_json::from_str(&embedding).unwrap_or_default();
    let record = ChunkRecord {
        id,
        spdx_id,
        chunk_index: chunk_index.parse().unwrap_or(0),
        content,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        embedding: Some(vector.clone()),
    };
    (record, vector)
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn replace_chunks(
        &self,
        spdx_id: &str,
        chunks: Vec<ChunkRecord>,
    ) -> Result<(), LicenseerError> {
        let spdx_id = spdx_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.execute("DELETE FROM chunks WHERE spdx_id = ?1", [spdx_id.as_str()])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                for chunk in &chunks {
                    // Only embedded chunks participate in retrieval.
                    let Some(embedding) = chunk.embedding.as_ref() else {
                        continue;
                    };
                    let index = chunk.chunk_index.to_string();
                    let metadata = chunk.metadata.to_string();
                    let embedding = serde_json::to_string(embedding)
                        .map_err(|err| tokio_rusqlite::Error::Other(Box::new(err)))?;
                    tx.execute(
                        "INSERT INTO chunks (id, spdx_id, chunk_index, content, metadata, embedding) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        [
                            chunk.id.as_str(),
                            chunk.spdx_id.as_str(),
                            index.as_str(),
                            chunk.content.as_str(),
                            metadata.as_str(),
                            embedding.as_str(),
                        ],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn chunks_for_license(&self, spdx_id: &str) -> Result<Vec<ChunkRecord>, LicenseerError> {
        let spdx_id = spdx_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, spdx_id, chunk_index, content, metadata, embedding \
                         FROM chunks WHERE spdx_id = ?1 ORDER BY CAST(chunk_index AS INTEGER)",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([spdx_id.as_str()], |row| {
                        Ok(decode_row(
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        )
                        .0)
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut records = Vec::new();
                for row in rows {
                    records.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(records)
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn licenses_with_chunks(&self) -> Result<Vec<String>, LicenseerError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT DISTINCT spdx_id FROM chunks ORDER BY spdx_id")
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(ids)
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, LicenseerError> {
        let query = query_embedding.to_vec();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, spdx_id, chunk_index, content, metadata, embedding \
                         FROM chunks",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(decode_row(
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut scored: Vec<(ChunkRecord, f32)> = Vec::new();
                for row in rows {
                    let (record, vector) = row.map_err(tokio_rusqlite::Error::Rusqlite)?;
                    let score = cosine_similarity(&query, &vector);
                    scored.push((record, score));
                }
                // Descending similarity; chunk id breaks ties deterministically.
                scored.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.id.cmp(&b.0.id))
                });
                scored.truncate(top_k);
                Ok(scored)
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, LicenseerError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| LicenseerError::Storage(err.to_string()))
    }
}
