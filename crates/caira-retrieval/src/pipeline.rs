//! End-to-end index build: load, chunk, embed, build, persist.

use std::path::PathBuf;

use caira_core::{CairaError, ChunkStats, IndexStats, PathsConfig};
use caira_index::IndexStore;
use caira_ingest::chunker::Chunker;
use caira_ingest::embedding::Embedder;
use caira_ingest::loader::DocumentSource;
use serde::Serialize;

/// Summary of a completed index build.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Documents loaded from the source.
    pub documents: usize,
    /// Token statistics over the produced chunks.
    pub chunk_stats: ChunkStats,
    /// Size of the persisted index.
    pub index_stats: IndexStats,
    /// Where the binary index was written.
    pub index_path: PathBuf,
    /// Where the metadata array was written.
    pub metadata_path: PathBuf,
}

/// Build and persist a vector store from `source`.
///
/// # Errors
///
/// Returns [`CairaError::InvalidInput`] naming the scanned directories when
/// the source yields no documents or the documents yield no chunks.
/// Chunking, embedding, build and persistence errors propagate unchanged.
pub async fn build_index(
    source: &dyn DocumentSource,
    chunker: &Chunker,
    embedder: &Embedder,
    paths: &PathsConfig,
    batch_size: usize,
) -> Result<BuildReport, CairaError> {
    let documents = source.load_all()?;
    if documents.is_empty() {
        return Err(CairaError::InvalidInput(format!(
            "no documents found; add .txt or .md files to {}",
            describe_dirs(source)
        )));
    }
    tracing::info!(documents = documents.len(), "loaded documents");

    let chunks = chunker.chunk_many(&documents)?;
    let Some(chunk_stats) = Chunker::stats(&chunks) else {
        return Err(CairaError::InvalidInput(format!(
            "documents in {} produced no chunks",
            describe_dirs(source)
        )));
    };
    tracing::info!(
        chunks = chunk_stats.total_chunks,
        avg_tokens = chunk_stats.avg_tokens,
        "chunked documents"
    );

    let embedded = embedder.embed_chunks(&chunks, batch_size).await?;

    let mut store = IndexStore::new();
    store.build(&embedded)?;
    store.persist(&paths.index_path, &paths.metadata_path)?;
    let index_stats = store.stats()?;

    Ok(BuildReport {
        documents: documents.len(),
        chunk_stats,
        index_stats,
        index_path: paths.index_path.clone(),
        metadata_path: paths.metadata_path.clone(),
    })
}

fn describe_dirs(source: &dyn DocumentSource) -> String {
    let dirs = source.describe();
    if dirs.is_empty() {
        return "the configured source".into();
    }
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
