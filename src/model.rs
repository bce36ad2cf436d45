//! Typed entities for the license knowledge base.
//!
//! The source system kept these as schemaless graph records; here every
//! entity is an explicit structure with required/optional fields stated,
//! validated at the store boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad licensing category used for retrieval-time filtering and display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseCategory {
    /// Minimal reuse restrictions (MIT, BSD, Apache).
    Permissive,
    /// Derivative works must carry compatible terms (GPL family).
    Copyleft,
    /// Anything that does not cleanly fit the two buckets above.
    Other,
}

impl LicenseCategory {
    /// Parse a category label as found in ingestion inputs.
    ///
    /// Unrecognized labels fall back to [`LicenseCategory::Other`] so a
    /// single odd record never aborts corpus ingestion.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "permissive" => Self::Permissive,
            "copyleft" => Self::Copyleft,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for LicenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permissive => write!(f, "permissive"),
            Self::Copyleft => write!(f, "copyleft"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A license document plus its catalog metadata.
///
/// Identity is the SPDX identifier; corpus ingestion upserts by it and
/// replaces all fields, so re-ingestion is idempotent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub spdx_id: String,
    pub name: String,
    pub category: LicenseCategory,
    /// Full license text; the unit the chunking pipeline consumes.
    pub text: String,
    pub version: Option<String>,
    pub submitter: Option<String>,
    pub steward: Option<String>,
    pub steward_url: Option<String>,
    pub source_url: Option<String>,
}

impl License {
    pub fn new(
        spdx_id: impl Into<String>,
        name: impl Into<String>,
        category: LicenseCategory,
        text: impl Into<String>,
    ) -> Self {
        Self {
            spdx_id: spdx_id.into(),
            name: name.into(),
            category,
            text: text.into(),
            version: None,
            submitter: None,
            steward: None,
            steward_url: None,
            source_url: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Denormalized metadata carried on package reads and chunk records.
    pub fn summary(&self) -> LicenseSummary {
        LicenseSummary {
            spdx_id: self.spdx_id.clone(),
            name: self.name.clone(),
            category: self.category,
            version: self.version.clone(),
        }
    }
}

/// Compact license metadata without the full text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub spdx_id: String,
    pub name: String,
    pub category: LicenseCategory,
    pub version: Option<String>,
}

/// A package as declared by a registry dump. Identity is the package name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub repository_url: Option<String>,
    pub dependents_count: Option<u64>,
    pub keywords: Vec<String>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            homepage: None,
            repository_url: None,
            dependents_count: None,
            keywords: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A package read model: the package plus its resolved license summaries.
///
/// `licenses` may be empty (unlicensed or unknown packages), a single
/// entry, or many (dual licensing). Ordered by SPDX id for determinism.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub package: Package,
    pub licenses: Vec<LicenseSummary>,
}

impl PackageInfo {
    /// The "primary" license heuristic: first declared license, if any.
    pub fn primary_license(&self) -> Option<&LicenseSummary> {
        self.licenses.first()
    }
}

/// A license-text passage with its embedding, the unit of retrieval.
///
/// Identity is `(spdx_id, chunk_index)`; `id` is the stable string form of
/// that pair. The chunk set of one license is always replaced wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub spdx_id: String,
    pub chunk_index: usize,
    pub content: String,
    /// Denormalized license metadata for retrieval-time filtering.
    pub metadata: serde_json::Value,
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(spdx_id: impl Into<String>, chunk_index: usize, content: impl Into<String>) -> Self {
        let spdx_id = spdx_id.into();
        Self {
            id: format!("{spdx_id}:{chunk_index}"),
            spdx_id,
            chunk_index,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// One evaluated cell of the license cross-product.
///
/// `is_compatible = false` covers both "known incompatible" and "no matrix
/// entry" — the documented lossy convention of the compatibility matrix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePairCheck {
    pub license1: String,
    pub license2: String,
    pub is_compatible: bool,
}

/// The resolver's structured result for a pair of packages.
///
/// `overall_compatible` is an optimistic union: true iff ANY pair in the
/// cross-product is compatible. The full cross-product is preserved so
/// consumers needing all-pairs semantics can re-aggregate themselves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityVerdict {
    pub package1: PackageInfo,
    pub package2: PackageInfo,
    pub pairs: Vec<LicensePairCheck>,
    pub overall_compatible: bool,
}

/// Outcome of resolving two package names. Absence is data, not an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PackageResolution {
    Resolved(CompatibilityVerdict),
    NotFound {
        /// Names that could not be found, in query order.
        missing: Vec<String>,
        /// Whichever side *was* found, if either.
        found: Option<PackageInfo>,
    },
}
