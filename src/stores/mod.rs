//! Storage interfaces and the SQLite backends behind them.
//!
//! Four narrow async traits cover the knowledge base and the vector side:
//!
//! ```text
//!  LicenseStore ───┐
//!  PackageStore ───┼──► SqliteKnowledgeStore  (licenses, packages,
//!  CompatibilityStore ┘                        edges, matrix)
//!
//!  ChunkStore ────────► SqliteChunkStore      (passages + embeddings)
//! ```
//!
//! Implementations assume per-statement atomicity from the backing store
//! but no multi-statement transactions across reads; concurrent writers
//! between a resolver's sequential lookups can yield a stale verdict,
//! which is accepted as eventual consistency. Absent data is expressed as
//! `Option::None`, never as an error.

pub mod chunks;
pub mod sqlite;

use async_trait::async_trait;

use crate::model::{ChunkRecord, License, Package, PackageInfo};
use crate::types::LicenseerError;

pub use chunks::SqliteChunkStore;
pub use sqlite::SqliteKnowledgeStore;

/// Durable repository of license documents and metadata.
#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Idempotent upsert keyed by SPDX id; replaces all fields.
    async fn upsert_license(&self, license: &License) -> Result<(), LicenseerError>;

    async fn get_license(&self, spdx_id: &str) -> Result<Option<License>, LicenseerError>;

    /// All licenses, order-insensitive.
    async fn list_licenses(&self) -> Result<Vec<License>, LicenseerError>;
}

/// Durable repository mapping package names to metadata and licenses.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Idempotent upsert keyed by package name.
    async fn upsert_package(&self, package: &Package) -> Result<(), LicenseerError>;

    /// Package plus its resolved license summaries, ordered by SPDX id.
    async fn get_package(&self, name: &str) -> Result<Option<PackageInfo>, LicenseerError>;

    /// Associate a package with a license. Duplicate attachment is a
    /// no-op; attaching against a missing package or license asserts
    /// nothing and still succeeds.
    async fn attach_license(&self, package_name: &str, spdx_id: &str)
        -> Result<(), LicenseerError>;
}

/// Directed pairwise compatibility relation between licenses.
///
/// The relation is not guaranteed symmetric: mutual compatibility must be
/// asserted (and queried) in both directions. Unknown pairs are absent,
/// not stored as false.
#[async_trait]
pub trait CompatibilityStore: Send + Sync {
    /// Upsert one directed edge. Self-pairs are legal and meaningful.
    async fn set_compatibility(
        &self,
        source_id: &str,
        target_id: &str,
        is_compatible: bool,
    ) -> Result<(), LicenseerError>;

    /// `None` means "no data", which callers must keep distinct from
    /// `Some(false)`.
    async fn get_compatibility(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<bool>, LicenseerError>;
}

/// Storage for embedded license-text passages with similarity search.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Replace the entire chunk set of one license (delete + insert,
    /// transactional). Chunks without embeddings are skipped.
    async fn replace_chunks(
        &self,
        spdx_id: &str,
        chunks: Vec<ChunkRecord>,
    ) -> Result<(), LicenseerError>;

    /// All stored chunks for a license, ordered by chunk index.
    async fn chunks_for_license(&self, spdx_id: &str) -> Result<Vec<ChunkRecord>, LicenseerError>;

    /// SPDX ids that currently have at least one stored chunk.
    async fn licenses_with_chunks(&self) -> Result<Vec<String>, LicenseerError>;

    /// Nearest neighbors of `query_embedding` by cosine similarity,
    /// most similar first, at most `top_k` results.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, LicenseerError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, LicenseerError>;
}
