//! Orchestrator flows with a scripted text service double.

use std::sync::Arc;

use async_trait::async_trait;
use licenseer::embeddings::MockEmbeddingProvider;
use licenseer::evidence::EvidenceSynthesizer;
use licenseer::llm::{PackageExtraction, TextService};
use licenseer::model::{License, LicenseCategory, Package, PackageResolution};
use licenseer::orchestrator::QueryOrchestrator;
use licenseer::resolver::CompatibilityResolver;
use licenseer::retrieval::Retriever;
use licenseer::stores::{
    CompatibilityStore, LicenseStore, PackageStore, SqliteChunkStore, SqliteKnowledgeStore,
};
use licenseer::types::LicenseerError;

/// Text service double driven by fixed responses.
struct ScriptedTextService {
    extraction: Result<PackageExtraction, String>,
    generation: Result<String, String>,
}

impl ScriptedTextService {
    fn extracting(package1: &str, package2: &str) -> Self {
        Self {
            extraction: Ok(PackageExtraction {
                package1: Some(package1.to_string()),
                package2: Some(package2.to_string()),
            }),
            generation: Ok("Generated answer about license compatibility.".to_string()),
        }
    }

    fn empty_extraction() -> Self {
        Self {
            extraction: Ok(PackageExtraction::default()),
            generation: Ok("unused".to_string()),
        }
    }

    fn with_failing_generation(mut self) -> Self {
        self.generation = Err("model unavailable".to_string());
        self
    }
}

#[async_trait]
impl TextService for ScriptedTextService {
    async fn extract_packages(&self, _query: &str) -> Result<PackageExtraction, LicenseerError> {
        self.extraction
            .clone()
            .map_err(LicenseerError::ExternalService)
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LicenseerError> {
        self.generation
            .clone()
            .map_err(LicenseerError::ExternalService)
    }
}

async fn orchestrator(
    text_service: ScriptedTextService,
) -> (QueryOrchestrator, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let knowledge = Arc::new(
        SqliteKnowledgeStore::open(dir.path().join("kb.db"))
            .await
            .unwrap(),
    );
    let chunks = Arc::new(
        SqliteChunkStore::open(dir.path().join("chunks.db"))
            .await
            .unwrap(),
    );

    for (spdx_id, name, category) in [
        ("MIT", "MIT License", LicenseCategory::Permissive),
        ("GPL-3.0", "GNU General Public License v3.0", LicenseCategory::Copyleft),
    ] {
        knowledge
            .upsert_license(&License::new(spdx_id, name, category, "text"))
            .await
            .unwrap();
    }
    knowledge.set_compatibility("MIT", "MIT", true).await.unwrap();
    knowledge
        .set_compatibility("MIT", "GPL-3.0", false)
        .await
        .unwrap();
    for (pkg, lic) in [("flask", "MIT"), ("sqlalchemy", "MIT"), ("readline", "GPL-3.0")] {
        knowledge.upsert_package(&Package::new(pkg)).await.unwrap();
        knowledge.attach_license(pkg, lic).await.unwrap();
    }

    let resolver = Arc::new(CompatibilityResolver::new(knowledge.clone(), knowledge));
    let retriever = Arc::new(Retriever::new(chunks, Arc::new(MockEmbeddingProvider::new())));
    let synthesizer = Arc::new(EvidenceSynthesizer::new(retriever));
    (
        QueryOrchestrator::new(resolver, synthesizer, Arc::new(text_service)),
        dir,
    )
}

#[tokio::test]
async fn vague_query_asks_for_clarification() {
    let (orchestrator, _dir) = orchestrator(ScriptedTextService::empty_extraction()).await;
    let outcome = orchestrator.handle_query("are these compatible?").await;
    assert!(outcome.answer.contains("couldn't identify two packages"));
    assert!(outcome.resolution.is_none());
}

#[tokio::test]
async fn unknown_package_yields_a_not_found_answer() {
    let (orchestrator, _dir) =
        orchestrator(ScriptedTextService::extracting("flask", "leftpad")).await;
    let outcome = orchestrator
        .handle_query("can I use flask with leftpad?")
        .await;

    assert!(outcome.answer.contains("'leftpad'"));
    assert!(outcome.answer.contains("couldn't find"));
    let Some(PackageResolution::NotFound { missing, .. }) = outcome.resolution else {
        panic!("expected a not-found resolution");
    };
    assert_eq!(missing, vec!["leftpad".to_string()]);
}

#[tokio::test]
async fn resolved_query_returns_generated_answer_and_verdict() {
    let (orchestrator, _dir) =
        orchestrator(ScriptedTextService::extracting("flask", "sqlalchemy")).await;
    let outcome = orchestrator
        .handle_query("can I combine flask and sqlalchemy?")
        .await;

    assert_eq!(
        outcome.answer,
        "Generated answer about license compatibility."
    );
    let Some(PackageResolution::Resolved(verdict)) = outcome.resolution else {
        panic!("expected a resolved verdict");
    };
    assert!(verdict.overall_compatible);
}

#[tokio::test]
async fn generation_failure_still_states_the_verdict() {
    let (orchestrator, _dir) = orchestrator(
        ScriptedTextService::extracting("flask", "readline").with_failing_generation(),
    )
    .await;
    let outcome = orchestrator
        .handle_query("can I combine flask and readline?")
        .await;

    assert!(outcome.answer.starts_with("Sorry, I encountered an error"));
    assert!(outcome.answer.contains("'flask' (MIT)"));
    assert!(outcome.answer.contains("'readline' (GPL-3.0)"));
    assert!(outcome.answer.contains("are not compatible"));

    let Some(PackageResolution::Resolved(verdict)) = outcome.resolution else {
        panic!("expected a resolved verdict");
    };
    assert!(!verdict.overall_compatible);
}
