//! End-to-end pipeline: ingest a corpus with the deterministic embedding
//! provider, then retrieve against it.

use std::sync::Arc;
use std::time::Duration;

use licenseer::embeddings::MockEmbeddingProvider;
use licenseer::ingestion::{
    CompatibilityTable, CorpusIngestor, MatrixIngestor,
};
use licenseer::model::{License, LicenseCategory};
use licenseer::retrieval::{Retriever, RetrieverConfig};
use licenseer::stores::{
    ChunkStore, CompatibilityStore, SqliteChunkStore, SqliteKnowledgeStore,
};

const MIT_TEXT: &str = "Permission is hereby granted, free of charge, to any person \
obtaining a copy of this software and associated documentation files, to deal in \
the Software without restriction, including without limitation the rights to use, \
copy, modify, merge, publish, distribute, sublicense, and/or sell copies.";

const GPL_TEXT: &str = "You may convey a work based on the Program, or the \
modifications to produce it from the Program, in the form of source code, provided \
that you also meet all of these conditions: the work must carry prominent notices \
stating that you modified it.";

struct Pipeline {
    ingestor: CorpusIngestor,
    retriever: Retriever,
    chunks: Arc<SqliteChunkStore>,
    _dir: tempfile::TempDir,
}

async fn pipeline() -> Pipeline {
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
    let provider = Arc::new(MockEmbeddingProvider::new());

    let ingestor = CorpusIngestor::new(knowledge, chunks.clone(), provider.clone());
    let retriever = Retriever::new(chunks.clone(), provider);
    Pipeline {
        ingestor,
        retriever,
        chunks,
        _dir: dir,
    }
}

fn corpus() -> Vec<License> {
    vec![
        License::new("MIT", "MIT License", LicenseCategory::Permissive, MIT_TEXT),
        License::new(
            "GPL-3.0",
            "GNU General Public License v3.0",
            LicenseCategory::Copyleft,
            GPL_TEXT,
        ),
    ]
}

#[tokio::test]
async fn ingested_corpus_is_retrievable() {
    let pipeline = pipeline().await;
    let report = pipeline.ingestor.ingest_documents(corpus()).await;
    assert!(report.all_succeeded(), "failures: {:?}", report.failed);
    assert!(pipeline.chunks.count().await.unwrap() >= 2);

    // Querying with stored text verbatim pins cosine similarity at 1.0,
    // well above the threshold.
    let response = pipeline.retriever.search(MIT_TEXT).await.unwrap();
    assert!(response.has_results);
    assert_eq!(response.result_count, response.results.len());
    assert_eq!(response.results[0].spdx_id, "MIT");
    assert!(response.results[0].score > 0.99);
}

#[tokio::test]
async fn off_topic_query_returns_no_results() {
    let pipeline = pipeline().await;
    pipeline.ingestor.ingest_documents(corpus()).await;

    let response = pipeline
        .retriever
        .search("quarterly marketing budget spreadsheet forecast")
        .await
        .unwrap();
    assert!(!response.has_results);
    assert_eq!(response.result_count, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn threshold_filter_can_shrink_the_top_k() {
    let pipeline = pipeline().await;
    pipeline.ingestor.ingest_documents(corpus()).await;

    // Lowering the threshold to zero returns every candidate; the default
    // threshold keeps only the close ones.
    let open = pipeline
        .retriever
        .search_with_k(MIT_TEXT, 10)
        .await
        .unwrap();
    let permissive_retriever = Retriever::new(
        pipeline.chunks.clone(),
        Arc::new(MockEmbeddingProvider::new()),
    )
    .with_config(RetrieverConfig {
        top_k: 10,
        similarity_threshold: 0.0,
    });
    let unfiltered = permissive_retriever
        .search_with_k(MIT_TEXT, 10)
        .await
        .unwrap();
    assert!(unfiltered.result_count >= open.result_count);
}

#[tokio::test]
async fn rebuild_runs_only_when_the_chunk_store_is_empty() {
    let pipeline = pipeline().await;
    // Seed the license store without chunking by going through a full
    // ingest, then a rebuild should be a no-op.
    pipeline.ingestor.ingest_documents(corpus()).await;
    assert!(pipeline.ingestor.rebuild_if_empty().await.unwrap().is_none());

    // Fresh chunk store, same licenses: rebuild regenerates passages.
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
    let ingestor = CorpusIngestor::new(
        knowledge,
        chunks.clone(),
        Arc::new(MockEmbeddingProvider::new()),
    );
    ingestor.ingest_documents(corpus()).await;

    // Wipe the chunk side only.
    chunks.replace_chunks("MIT", Vec::new()).await.unwrap();
    chunks.replace_chunks("GPL-3.0", Vec::new()).await.unwrap();
    assert_eq!(chunks.count().await.unwrap(), 0);

    let report = ingestor.rebuild_if_empty().await.unwrap();
    let report = report.expect("empty store should trigger a rebuild");
    assert!(report.all_succeeded());
    assert!(chunks.count().await.unwrap() >= 2);
}

#[tokio::test]
async fn matrix_sweep_skips_self_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SqliteKnowledgeStore::open(dir.path().join("kb.db"))
            .await
            .unwrap(),
    );

    let table = CompatibilityTable::from_csv(
        "id,MIT,GPL-3.0,Apache-2.0\n\
         MIT,Yes,No,Yes\n\
         GPL-3.0,Unknown,Yes,No\n\
         Apache-2.0,Yes,Unknown,Yes\n",
    )
    .unwrap();

    let ingestor = MatrixIngestor::new(store.clone()).with_write_delay(Duration::ZERO);
    let report = ingestor.ingest(&table).await;

    assert_eq!(report.skipped_self_pairs, 3);
    assert_eq!(report.written, 6);
    assert!(report.failed.is_empty());

    // Diagonal cells were never written.
    assert_eq!(store.get_compatibility("MIT", "MIT").await.unwrap(), None);
    // Unknown collapsed to false on write.
    assert_eq!(
        store.get_compatibility("GPL-3.0", "MIT").await.unwrap(),
        Some(false)
    );
    assert_eq!(
        store.get_compatibility("MIT", "Apache-2.0").await.unwrap(),
        Some(true)
    );
}
