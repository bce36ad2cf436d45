//! Embedding providers and vector similarity.
//!
//! The [`EmbeddingProvider`] trait is the seam between the pipeline and the
//! external embedding service. The same provider (same model, same
//! dimensions) must be used at ingestion and query time; retrieval quality
//! degrades silently otherwise. That is a deployment invariant, not
//! something enforced here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::retry::RetryPolicy;
use crate::types::LicenseerError;

/// Produces fixed-dimension vectors for text passages.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier (model name) recorded alongside stored chunks.
    fn id(&self) -> &str;

    /// Output vector length.
    fn dimensions(&self) -> usize;

    /// Embed a batch of inputs, preserving order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LicenseerError>;

    /// Embed a single input.
    async fn embed(&self, input: &str) -> Result<Vec<f32>, LicenseerError> {
        let mut vectors = self.embed_batch(std::slice::from_ref(&input.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| LicenseerError::ExternalService("empty embedding response".into()))
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ── OpenAI-compatible provider ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding client for any OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
    retry: RetryPolicy,
    dimensions: usize,
}

impl OpenAiEmbeddingProvider {
    /// `dimensions` must match what the configured model actually emits.
    pub fn new(
        config: OpenAiConfig,
        retry: RetryPolicy,
        dimensions: usize,
    ) -> Result<Self, LicenseerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LicenseerError::ExternalService(err.to_string()))?;
        Ok(Self {
            client,
            config,
            retry,
            dimensions,
        })
    }

    async fn request_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LicenseerError> {
        let body = json!({
            "model": self.config.embedding_model,
            "input": inputs,
        });
        let response = self
            .client
            .post(self.config.endpoint("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let mut parsed: EmbeddingsResponse = response.json().await?;
        if parsed.data.len() != inputs.len() {
            return Err(LicenseerError::ExternalService(format!(
                "embedding service returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        parsed.data.sort_by_key(|datum| datum.index);
        Ok(parsed.data.into_iter().map(|datum| datum.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn id(&self) -> &str {
        &self.config.embedding_model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LicenseerError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = inputs.len(), model = %self.config.embedding_model, "embedding batch");
        self.retry.run(|| self.request_embeddings(inputs)).await
    }
}

// ── Deterministic mock provider ────────────────────────────────────────

/// Deterministic embedding provider for tests and offline pipelines.
///
/// Each lowercase alphanumeric token is hashed into a bucket of the output
/// vector and the result is L2-normalized, so identical text always maps
/// to the identical vector and token overlap drives cosine similarity.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 256 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, input: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(input) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn id(&self) -> &str {
        "mock-embedding"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LicenseerError> {
        Ok(inputs.iter().map(|input| self.embed_one(input)).collect())
    }
}

fn tokenize(input: &str) -> impl Iterator<Item = String> + '_ {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

/// FNV-1a, fixed across platforms and releases so stored vectors stay
/// comparable between runs.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];
        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn mock_embeddings_are_normalized() {
        let provider = MockEmbeddingProvider::new();
        let vector = provider.embed("permission is granted").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn identical_vectors_have_unit_similarity() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn token_overlap_drives_similarity() {
        let provider = MockEmbeddingProvider::new();
        let base = provider.embed("permission granted free of charge").await.unwrap();
        let close = provider.embed("permission granted free of charge today").await.unwrap();
        let far = provider.embed("quarterly revenue forecast spreadsheet").await.unwrap();
        assert!(cosine_similarity(&base, &close) > cosine_similarity(&base, &far));
    }
}
