//! Semantic retrieval over stored license passages.
//!
//! Two stages, mirroring the source system's retriever: a top-k nearest
//! neighbor search followed by a similarity-threshold filter that drops
//! weak matches even when they made the top k. The effective result count
//! can therefore be smaller than k, including zero — zero results is a
//! valid outcome, not an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::stores::ChunkStore;
use crate::types::LicenseerError;

/// Retrieval tunables.
#[derive(Clone, Copy, Debug)]
pub struct RetrieverConfig {
    /// Candidates fetched from the nearest-neighbor stage.
    pub top_k: usize,
    /// Minimum cosine similarity a candidate must reach to be returned.
    pub similarity_threshold: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.7,
        }
    }
}

/// One passage that survived both stages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub spdx_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f32,
}

/// Result of one retrieval query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub query: String,
    pub results: Vec<RetrievedPassage>,
    pub has_results: bool,
    pub result_count: usize,
}

impl RetrievalResponse {
    fn empty(query: String) -> Self {
        Self {
            query,
            results: Vec::new(),
            has_results: false,
            result_count: 0,
        }
    }
}

/// Embeds queries and searches the chunk store.
///
/// The provider must be the same one used at ingestion time; mixing
/// models silently degrades scores.
pub struct Retriever {
    store: Arc<dyn ChunkStore>,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(store: Arc<dyn ChunkStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            provider,
            config: RetrieverConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RetrieverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> RetrieverConfig {
        self.config
    }

    /// Search with the configured top-k.
    pub async fn search(&self, query: &str) -> Result<RetrievalResponse, LicenseerError> {
        self.search_with_k(query, self.config.top_k).await
    }

    /// Search with an explicit candidate count.
    pub async fn search_with_k(
        &self,
        query: &str,
        k: usize,
    ) -> Result<RetrievalResponse, LicenseerError> {
        if k == 0 {
            return Ok(RetrievalResponse::empty(query.to_string()));
        }

        let embedding = self
            .provider
            .embed(query)
            .await
            .map_err(|err| LicenseerError::Retrieval(err.to_string()))?;
        let candidates = self
            .store
            .search_similar(&embedding, k)
            .await
            .map_err(|err| LicenseerError::Retrieval(err.to_string()))?;

        let results: Vec<RetrievedPassage> = candidates
            .into_iter()
            .filter(|(_, score)| *score >= self.config.similarity_threshold)
            .map(|(record, score)| RetrievedPassage {
                spdx_id: record.spdx_id,
                chunk_index: record.chunk_index,
                content: record.content,
                metadata: record.metadata,
                score,
            })
            .collect();

        debug!(
            query_len = query.len(),
            candidates = k,
            returned = results.len(),
            "retrieval query complete"
        );

        let result_count = results.len();
        Ok(RetrievalResponse {
            query: query.to_string(),
            has_results: result_count > 0,
            result_count,
            results,
        })
    }
}
