//! Shared error taxonomy for the licenseer engine.
//!
//! Missing packages and licenses are deliberately *not* errors: lookups
//! return `Option`/structured results so callers can distinguish "no data"
//! from genuine failures (see [`crate::model::PackageResolution`]).

use thiserror::Error;

/// Errors surfaced by stores, the retrieval pipeline, and external services.
#[derive(Debug, Error)]
pub enum LicenseerError {
    /// Backing-store failure (SQLite open, query, or write).
    #[error("storage failure: {0}")]
    Storage(String),

    /// Vector search failure. Callers that only ground narrative text treat
    /// this as "zero results" rather than failing the request.
    #[error("retrieval failure: {0}")]
    Retrieval(String),

    /// Embedding or text service failure (network, HTTP status, decode).
    #[error("external service failure: {0}")]
    ExternalService(String),

    /// Text could not be chunked into retrievable passages.
    #[error("chunking failure: {0}")]
    Chunking(String),

    /// Malformed ingestion input (compatibility tables, registry records).
    #[error("invalid ingestion input: {0}")]
    InvalidInput(String),

    /// Filesystem failure outside the SQLite stores.
    #[error("io failure: {0}")]
    Io(String),

    /// Missing or malformed configuration (environment variables).
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for LicenseerError {
    fn from(err: std::io::Error) -> Self {
        LicenseerError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for LicenseerError {
    fn from(err: reqwest::Error) -> Self {
        LicenseerError::ExternalService(err.to_string())
    }
}
