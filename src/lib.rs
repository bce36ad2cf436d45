//! ```text
//! License corpus ──► ingestion::corpus ─► chunking ─► embeddings ─► ChunkStore
//! Matrix CSV     ──► ingestion::matrix ──────────────────────────► CompatibilityStore
//! Registry dump  ──► ingestion::packages ────────────────────────► PackageStore
//!
//! User query ──► orchestrator ─┬─► llm::TextService (extract)
//!                              ├─► resolver ──► PackageStore + CompatibilityStore
//!                              ├─► evidence ──► retrieval ──► ChunkStore
//!                              └─► llm::TextService (generate) ──► QueryOutcome
//! ```
//!
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod evidence;
pub mod ingestion;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod resolver;
pub mod retrieval;
pub mod retry;
pub mod stores;
pub mod types;

pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, OpenAiEmbeddingProvider};
pub use evidence::{EvidenceBundle, EvidenceSynthesizer};
pub use ingestion::{CorpusIngestor, MatrixIngestor, PackageIngestor};
pub use llm::{OpenAiTextService, TextService};
pub use model::{
    CompatibilityVerdict, License, LicenseCategory, Package, PackageInfo, PackageResolution,
};
pub use orchestrator::{QueryOrchestrator, QueryOutcome};
pub use resolver::CompatibilityResolver;
pub use retrieval::{RetrievalResponse, Retriever, RetrieverConfig};
pub use stores::{
    ChunkStore, CompatibilityStore, LicenseStore, PackageStore, SqliteChunkStore,
    SqliteKnowledgeStore,
};
pub use types::LicenseerError;
