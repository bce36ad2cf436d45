//! Ingestion of the three knowledge-base inputs.
//!
//! * [`corpus`] — license documents: upsert, chunk, embed, store passages.
//! * [`matrix`] — the pairwise compatibility table.
//! * [`packages`] — registry metadata with declared license identifiers.
//!
//! Failures are isolated per item throughout: one bad license, cell, or
//! package never aborts its batch, and every ingestor reports successes
//! and failures to the caller.

pub mod corpus;
pub mod matrix;
pub mod packages;

pub use corpus::{CorpusIngestor, IngestFailure, IngestReport};
pub use matrix::{CompatibilityCell, CompatibilityTable, MatrixIngestReport, MatrixIngestor};
pub use packages::{PackageIngestor, PackageRecord};
