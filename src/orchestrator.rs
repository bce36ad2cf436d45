//! End-to-end query handling: extract package names, resolve the
//! verdict, gather evidence, and generate a grounded answer.
//!
//! `handle_query` is infallible by contract. Every failure mode inside
//! the pipeline degrades to a user-facing message, and whenever the
//! resolver produced a verdict that verdict survives into the answer
//! even if generation itself fails.

use std::sync::Arc;

use tracing::{info, warn};

use crate::evidence::{EvidenceBundle, EvidenceSynthesizer};
use crate::llm::TextService;
use crate::model::{CompatibilityVerdict, PackageInfo, PackageResolution};
use crate::resolver::CompatibilityResolver;

const CLARIFICATION_MESSAGE: &str = "I couldn't identify two packages in your query. \
     Please specify two packages to check their compatibility.";

const ERROR_FALLBACK_PREFIX: &str = "Sorry, I encountered an error while generating a detailed answer.";

/// What the engine hands back for one user query.
#[derive(Clone, Debug)]
pub struct QueryOutcome {
    /// Prose answer, always present.
    pub answer: String,
    /// Structured resolution when the pipeline got far enough to produce
    /// one; `None` for clarification requests and extraction failures.
    pub resolution: Option<PackageResolution>,
}

impl QueryOutcome {
    fn message(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            resolution: None,
        }
    }
}

/// Drives a user query through extraction, resolution, evidence, and
/// answer generation.
pub struct QueryOrchestrator {
    resolver: Arc<CompatibilityResolver>,
    synthesizer: Arc<EvidenceSynthesizer>,
    text_service: Arc<dyn TextService>,
}

impl QueryOrchestrator {
    pub fn new(
        resolver: Arc<CompatibilityResolver>,
        synthesizer: Arc<EvidenceSynthesizer>,
        text_service: Arc<dyn TextService>,
    ) -> Self {
        Self {
            resolver,
            synthesizer,
            text_service,
        }
    }

    /// Answer a free-text compatibility question.
    pub async fn handle_query(&self, query: &str) -> QueryOutcome {
        let extraction = match self.text_service.extract_packages(query).await {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!(error = %err, "package extraction failed");
                return QueryOutcome::message(CLARIFICATION_MESSAGE);
            }
        };
        let (name1, name2) = match extraction.pair() {
            Some(pair) => pair,
            None => {
                info!("query did not name two packages, asking for clarification");
                return QueryOutcome::message(CLARIFICATION_MESSAGE);
            }
        };

        let resolution = match self.resolver.resolve_packages(&name1, &name2).await {
            Ok(resolution) => resolution,
            Err(err) => {
                warn!(package1 = %name1, package2 = %name2, error = %err, "resolution failed");
                return QueryOutcome::message(format!(
                    "Sorry, I encountered an error while looking up '{name1}' and '{name2}'. \
                     Please try again."
                ));
            }
        };

        match resolution {
            PackageResolution::NotFound { missing, found } => {
                let answer = not_found_message(&missing);
                QueryOutcome {
                    answer,
                    resolution: Some(PackageResolution::NotFound { missing, found }),
                }
            }
            PackageResolution::Resolved(verdict) => {
                let answer = self.answer_for_verdict(&verdict).await;
                QueryOutcome {
                    answer,
                    resolution: Some(PackageResolution::Resolved(verdict)),
                }
            }
        }
    }

    async fn answer_for_verdict(&self, verdict: &CompatibilityVerdict) -> String {
        let evidence = self.gather_evidence(verdict).await;
        let prompt = generation_prompt(verdict, &evidence);
        match self.text_service.generate(&prompt).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "answer generation failed, falling back to verdict summary");
                format!(
                    "{ERROR_FALLBACK_PREFIX} {}",
                    verdict_summary(verdict)
                )
            }
        }
    }

    async fn gather_evidence(&self, verdict: &CompatibilityVerdict) -> Option<EvidenceBundle> {
        let lic1 = verdict.package1.primary_license()?;
        let lic2 = verdict.package2.primary_license()?;
        Some(self.synthesizer.gather(lic1, lic2).await)
    }
}

fn not_found_message(missing: &[String]) -> String {
    match missing {
        [one] => format!(
            "I couldn't find the package '{one}' in my knowledge base, so I can't \
             determine its license compatibility."
        ),
        _ => format!(
            "I couldn't find the packages {} in my knowledge base, so I can't \
             determine their license compatibility.",
            missing
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(" and ")
        ),
    }
}

fn license_list(info: &PackageInfo) -> String {
    if info.licenses.is_empty() {
        return "no declared license".to_string();
    }
    info.licenses
        .iter()
        .map(|lic| lic.spdx_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One-sentence statement of the structured verdict, used both in the
/// generation prompt and in the generation-failure fallback.
fn verdict_summary(verdict: &CompatibilityVerdict) -> String {
    let relation = if verdict.overall_compatible {
        "compatible"
    } else {
        "not compatible"
    };
    format!(
        "Based on the compatibility matrix, '{}' ({}) and '{}' ({}) are {relation}.",
        verdict.package1.package.name,
        license_list(&verdict.package1),
        verdict.package2.package.name,
        license_list(&verdict.package2),
    )
}

fn generation_prompt(verdict: &CompatibilityVerdict, evidence: &Option<EvidenceBundle>) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a license compatibility assistant. Answer the user's question using \
         ONLY the verdict and license text excerpts below. State the verdict clearly, \
         explain which license rule drives it, and if the packages are incompatible, \
         suggest what the user could consider as an alternative.\n\n",
    );
    prompt.push_str(&format!("Verdict: {}\n", verdict_summary(verdict)));
    prompt.push_str("License pairs evaluated:\n");
    for pair in &verdict.pairs {
        prompt.push_str(&format!(
            "- {} vs {}: {}\n",
            pair.license1,
            pair.license2,
            if pair.is_compatible {
                "compatible"
            } else {
                "not compatible"
            }
        ));
    }
    match evidence {
        Some(bundle) if bundle.has_results => {
            prompt.push_str("\nLicense text excerpts:\n");
            prompt.push_str(&bundle.context_text());
        }
        _ => {
            prompt.push_str(
                "\nNo license text excerpts were retrieved; answer from the verdict alone.",
            );
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LicenseCategory, LicensePairCheck, LicenseSummary, Package};

    fn info(name: &str, spdx_ids: &[&str]) -> PackageInfo {
        PackageInfo {
            package: Package::new(name),
            licenses: spdx_ids
                .iter()
                .map(|id| LicenseSummary {
                    spdx_id: (*id).to_string(),
                    name: format!("{id} License"),
                    category: LicenseCategory::Other,
                    version: None,
                })
                .collect(),
        }
    }

    fn verdict(compatible: bool) -> CompatibilityVerdict {
        CompatibilityVerdict {
            package1: info("flask", &["BSD-3-Clause"]),
            package2: info("readline", &["GPL-3.0"]),
            pairs: vec![LicensePairCheck {
                license1: "BSD-3-Clause".into(),
                license2: "GPL-3.0".into(),
                is_compatible: compatible,
            }],
            overall_compatible: compatible,
        }
    }

    #[test]
    fn summary_states_the_verdict_and_licenses() {
        let text = verdict_summary(&verdict(false));
        assert!(text.contains("'flask' (BSD-3-Clause)"));
        assert!(text.contains("'readline' (GPL-3.0)"));
        assert!(text.contains("are not compatible"));

        assert!(verdict_summary(&verdict(true)).contains("are compatible"));
    }

    #[test]
    fn unlicensed_package_is_spelled_out() {
        let mut v = verdict(false);
        v.package2.licenses.clear();
        assert!(verdict_summary(&v).contains("no declared license"));
    }

    #[test]
    fn not_found_message_names_every_missing_package() {
        let one = not_found_message(&["leftpad".to_string()]);
        assert!(one.contains("'leftpad'"));

        let two = not_found_message(&["leftpad".to_string(), "rightpad".to_string()]);
        assert!(two.contains("'leftpad'"));
        assert!(two.contains("'rightpad'"));
    }

    #[test]
    fn prompt_includes_pairs_and_handles_missing_evidence() {
        let prompt = generation_prompt(&verdict(false), &None);
        assert!(prompt.contains("BSD-3-Clause vs GPL-3.0: not compatible"));
        assert!(prompt.contains("answer from the verdict alone"));
    }
}
