//! License corpus ingestion: upsert documents, split their text, embed
//! the chunks, and replace the stored passage set per license.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::EmbeddingProvider;
use crate::model::{ChunkRecord, License};
use crate::retry::RetryPolicy;
use crate::stores::{ChunkStore, LicenseStore};
use crate::types::LicenseerError;

/// One license that failed to ingest, with the reason.
#[derive(Clone, Debug)]
pub struct IngestFailure {
    pub id: String,
    pub reason: String,
}

/// Per-batch ingestion summary. Failures never abort the batch; callers
/// inspect this report instead.
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn record_success(&mut self, id: impl Into<String>) {
        self.succeeded.push(id.into());
    }

    pub fn record_failure(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(IngestFailure {
            id: id.into(),
            reason: reason.into(),
        });
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives license documents through upsert → split → embed → store.
pub struct CorpusIngestor {
    licenses: Arc<dyn LicenseStore>,
    chunks: Arc<dyn ChunkStore>,
    provider: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    retry: RetryPolicy,
}

impl CorpusIngestor {
    pub fn new(
        licenses: Arc<dyn LicenseStore>,
        chunks: Arc<dyn ChunkStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            licenses,
            chunks,
            provider,
            chunking: ChunkingConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_chunking_config(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ingest a batch of license documents.
    ///
    /// Each document is processed independently; a failure is recorded in
    /// the report and the batch continues.
    pub async fn ingest_documents(&self, documents: Vec<License>) -> IngestReport {
        let mut report = IngestReport::default();
        for license in documents {
            let spdx_id = license.spdx_id.clone();
            match self.ingest_one(license).await {
                Ok(chunk_count) => {
                    info!(spdx_id = %spdx_id, chunks = chunk_count, "license ingested");
                    report.record_success(spdx_id);
                }
                Err(err) => {
                    warn!(spdx_id = %spdx_id, error = %err, "license ingestion failed");
                    report.record_failure(spdx_id, err.to_string());
                }
            }
        }
        report
    }

    /// Regenerate the chunk sets only when the chunk store is empty.
    ///
    /// This is the rebuild-on-absent fallback: the expensive embed pass
    /// runs once, and a present (loadable) store is reused as-is.
    pub async fn rebuild_if_empty(&self) -> Result<Option<IngestReport>, LicenseerError> {
        if self.chunks.count().await? > 0 {
            return Ok(None);
        }
        info!("chunk store is empty, rebuilding passage index from the corpus");
        let documents = self.licenses.list_licenses().await?;
        Ok(Some(self.ingest_documents(documents).await))
    }

    async fn ingest_one(&self, license: License) -> Result<usize, LicenseerError> {
        self.licenses.upsert_license(&license).await?;

        let pieces = split_text(&license.text, &self.chunking);
        if pieces.is_empty() {
            return Err(LicenseerError::Chunking(format!(
                "license '{}' has no text to chunk",
                license.spdx_id
            )));
        }

        let inputs: Vec<String> = pieces.iter().map(|piece| piece.content.clone()).collect();
        let embeddings = self
            .retry
            .run(|| self.provider.embed_batch(&inputs))
            .await?;
        if embeddings.len() != pieces.len() {
            return Err(LicenseerError::ExternalService(format!(
                "expected {} embeddings, received {}",
                pieces.len(),
                embeddings.len()
            )));
        }

        let total = pieces.len();
        let summary = license.summary();
        let records: Vec<ChunkRecord> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (piece, embedding))| {
                ChunkRecord::new(&license.spdx_id, index, piece.content)
                    .with_metadata(json!({
                        "name": summary.name,
                        "spdx_id": summary.spdx_id,
                        "category": summary.category,
                        "version": summary.version,
                        "source_url": license.source_url,
                        "chunk_overlap": piece.overlap,
                        "total_chunks": total,
                        "embedder": self.provider.id(),
                    }))
                    .with_embedding(embedding)
            })
            .collect();

        let embedded = records
            .iter()
            .filter(|record| record.embedding.is_some())
            .count();
        if embedded == 0 {
            return Err(LicenseerError::ExternalService(format!(
                "no chunk of license '{}' produced an embedding",
                license.spdx_id
            )));
        }

        self.chunks.replace_chunks(&license.spdx_id, records).await?;
        Ok(embedded)
    }
}
