//! Evidence synthesis: turn a compatibility verdict into a retrieval
//! query and collect the supporting license-text passages.

use std::sync::Arc;

use tracing::warn;

use crate::model::LicenseSummary;
use crate::retrieval::{RetrievedPassage, Retriever};

/// Supporting passages for one license pair, ready for answer generation.
#[derive(Clone, Debug)]
pub struct EvidenceBundle {
    /// The retrieval query that produced the passages.
    pub query: String,
    pub passages: Vec<RetrievedPassage>,
    pub has_results: bool,
}

impl EvidenceBundle {
    fn empty(query: String) -> Self {
        Self {
            query,
            passages: Vec::new(),
            has_results: false,
        }
    }

    /// Concatenated passage text for prompt assembly.
    pub fn context_text(&self) -> String {
        self.passages
            .iter()
            .map(|passage| passage.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Retrieves license-text evidence for a pair of licenses.
///
/// Evidence is best-effort: a retrieval failure degrades to an empty
/// bundle with a warning rather than failing the caller's query, since a
/// verdict without supporting passages is still a usable answer.
pub struct EvidenceSynthesizer {
    retriever: Arc<Retriever>,
}

impl EvidenceSynthesizer {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }

    /// The query template used for pairwise evidence lookups.
    pub fn pair_query(license1: &LicenseSummary, license2: &LicenseSummary) -> String {
        format!(
            "Are the {} ({}) and {} ({}) licenses compatible? \
             What are the key considerations when combining software under these licenses?",
            license1.name, license1.spdx_id, license2.name, license2.spdx_id
        )
    }

    pub async fn gather(
        &self,
        license1: &LicenseSummary,
        license2: &LicenseSummary,
    ) -> EvidenceBundle {
        let query = Self::pair_query(license1, license2);
        match self.retriever.search(&query).await {
            Ok(response) => EvidenceBundle {
                query: response.query,
                has_results: response.has_results,
                passages: response.results,
            },
            Err(err) => {
                warn!(
                    license1 = %license1.spdx_id,
                    license2 = %license2.spdx_id,
                    error = %err,
                    "evidence retrieval failed, continuing without passages"
                );
                EvidenceBundle::empty(query)
            }
        }
    }
}
