use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use caira_core::{CairaError, ChunkingConfig, PathsConfig};
use caira_index::IndexStore;
use caira_ingest::chunker::Chunker;
use caira_ingest::embedding::{Embedder, EmbeddingProvider};
use caira_ingest::loader::DirectoryLoader;
use caira_ingest::retry::RetryPolicy;
use caira_retrieval::{build_index, Retriever, NO_RESULTS_CONTEXT};

const DIM: usize = 16;

/// Character-frequency vector: identical texts embed identically.
struct CharHistogram;

#[async_trait]
impl EmbeddingProvider for CharHistogram {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CairaError> {
        let mut v = vec![0.0f32; DIM];
        for c in text.chars().filter(|c| c.is_alphanumeric()) {
            v[(c.to_ascii_lowercase() as usize) % DIM] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        Ok(v.into_iter().map(|x| x / norm).collect())
    }

    fn model(&self) -> &str {
        "char-histogram"
    }
}

const INCIDENT: &str = "Checkout API returned 502 after the ingress certificate expired.";
const RUNBOOK: &str = "To restart the payment service, drain the queue and then roll the pods.";
const LOG: &str = "ERROR db-pool: connection timeout after 30s waiting for a free slot";

fn write_corpus(root: &Path) {
    for (category, file, text) in [
        ("incidents", "inc-101.md", INCIDENT),
        ("runbooks", "payment-restart.md", RUNBOOK),
        ("logs", "db-pool.txt", LOG),
    ] {
        fs::create_dir_all(root.join(category)).unwrap();
        fs::write(root.join(category).join(file), text).unwrap();
    }
}

fn embedder() -> Embedder {
    Embedder::new(
        CharHistogram,
        RetryPolicy::new(1, Duration::ZERO),
        Duration::ZERO,
    )
}

fn chunker() -> Chunker {
    Chunker::with_default_tokenizer(ChunkingConfig {
        chunk_size: 50,
        chunk_overlap: 5,
    })
    .unwrap()
}

fn store_paths(root: &Path) -> PathsConfig {
    PathsConfig {
        data_dir: root.join("data"),
        index_path: root.join("vector_store/index.bin"),
        metadata_path: root.join("vector_store/metadata.json"),
    }
}

async fn build_and_load(root: &Path, embedder: &Embedder) -> IndexStore {
    let paths = store_paths(root);
    write_corpus(&paths.data_dir);

    let report = build_index(
        &DirectoryLoader::new(&paths.data_dir),
        &chunker(),
        embedder,
        &paths,
        2,
    )
    .await
    .unwrap();
    assert_eq!(report.documents, 3);
    assert_eq!(report.chunk_stats.total_chunks, 3);
    assert_eq!(report.index_stats.total_vectors, 3);
    assert_eq!(report.index_stats.dimension, DIM);

    let mut store = IndexStore::new();
    store.load(&paths.index_path, &paths.metadata_path).unwrap();
    store
}

#[tokio::test]
async fn query_matching_a_document_ranks_it_first() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = embedder();
    let store = build_and_load(dir.path(), &embedder).await;

    for pos in 0..3 {
        assert_eq!(store.record(pos).unwrap().metadata.total_chunks, 1);
    }

    let retriever = Retriever::new(&store, &embedder);
    let result = retriever.retrieve(RUNBOOK, 1, 0.0).await.unwrap();

    assert_eq!(result.chunks.len(), 1);
    let top = &result.chunks[0];
    assert_eq!(top.rank, 1);
    assert_eq!(top.metadata.metadata.document.filename, "payment-restart.md");
    assert_eq!(top.metadata.metadata.document.doc_type, "runbooks");
    assert_eq!(top.metadata.chunk_text, RUNBOOK);
    assert_eq!(top.distance, 0.0);
    assert_eq!(result.sources(), vec!["payment-restart.md".to_string()]);
    assert!(result
        .context
        .starts_with("[Document 1] Source: payment-restart.md (Type: runbooks)"));
}

#[tokio::test]
async fn threshold_above_one_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = embedder();
    let store = build_and_load(dir.path(), &embedder).await;

    let result = Retriever::new(&store, &embedder)
        .retrieve(LOG, 3, 1.1)
        .await
        .unwrap();
    assert!(result.chunks.is_empty());
    assert_eq!(result.context, NO_RESULTS_CONTEXT);
}

#[tokio::test]
async fn zero_threshold_returns_top_k() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = embedder();
    let store = build_and_load(dir.path(), &embedder).await;
    let retriever = Retriever::new(&store, &embedder);

    let result = retriever.retrieve(INCIDENT, 3, 0.0).await.unwrap();
    assert_eq!(result.chunks.len(), 3);

    let ranks: Vec<usize> = result.chunks.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(result.chunks[0].similarity, 1.0);
    assert_eq!(result.chunks[2].similarity, 0.0);
    for pair in result.chunks.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    let result = retriever.retrieve(INCIDENT, 2, 0.0).await.unwrap();
    assert_eq!(result.chunks.len(), 2);
}

#[tokio::test]
async fn filtered_chunks_keep_candidate_rank() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = embedder();
    let store = build_and_load(dir.path(), &embedder).await;

    let result = Retriever::new(&store, &embedder)
        .retrieve(INCIDENT, 3, 0.5)
        .await
        .unwrap();
    assert!(!result.chunks.is_empty());
    assert!(result.chunks.len() < 3);
    assert_eq!(result.chunks[0].rank, 1);
    assert!(result.chunks.iter().all(|c| c.similarity >= 0.5));
}

#[tokio::test]
async fn headers_can_be_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = embedder();
    let store = build_and_load(dir.path(), &embedder).await;

    let result = Retriever::new(&store, &embedder)
        .include_metadata(false)
        .retrieve(LOG, 1, 0.0)
        .await
        .unwrap();
    assert_eq!(result.context, format!("{LOG}\n"));
}

#[tokio::test]
async fn empty_store_is_not_loaded() {
    let store = IndexStore::new();
    let embedder = embedder();
    let err = Retriever::new(&store, &embedder)
        .retrieve("anything", 5, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err, CairaError::NotLoaded));
    assert_eq!(embedder.embedded_count(), 0);
}

#[tokio::test]
async fn empty_corpus_names_data_directories() {
    let dir = tempfile::tempdir().unwrap();
    let paths = store_paths(dir.path());
    fs::create_dir_all(&paths.data_dir).unwrap();

    let err = build_index(
        &DirectoryLoader::new(&paths.data_dir),
        &chunker(),
        &embedder(),
        &paths,
        10,
    )
    .await
    .unwrap_err();
    match err {
        CairaError::InvalidInput(msg) => {
            assert!(msg.contains("incidents"));
            assert!(msg.contains("runbooks"));
            assert!(msg.contains("logs"));
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
    assert!(!paths.index_path.exists());
}

#[tokio::test]
async fn blank_documents_produce_no_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let paths = store_paths(dir.path());
    fs::create_dir_all(paths.data_dir.join("runbooks")).unwrap();
    fs::write(paths.data_dir.join("runbooks/empty.md"), "").unwrap();

    let err = build_index(
        &DirectoryLoader::new(&paths.data_dir),
        &chunker(),
        &embedder(),
        &paths,
        10,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CairaError::InvalidInput(ref m) if m.contains("no chunks")));
}
