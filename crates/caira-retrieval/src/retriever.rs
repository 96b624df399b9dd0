use caira_core::{CairaError, RetrievalConfig, RetrievalResult, ScoredChunk};
use caira_index::IndexStore;
use caira_ingest::embedding::Embedder;

/// Context returned when no chunk passes the similarity threshold.
pub const NO_RESULTS_CONTEXT: &str = "No relevant information found in the knowledge base.";

/// Finds the chunks most relevant to a query.
///
/// Borrows a loaded [`IndexStore`] and the [`Embedder`] used to build it;
/// both must use the same embedding model.
#[derive(Debug)]
pub struct Retriever<'a> {
    store: &'a IndexStore,
    embedder: &'a Embedder,
    defaults: RetrievalConfig,
    include_metadata: bool,
}

impl<'a> Retriever<'a> {
    /// Create a retriever with default `top_k` and threshold.
    pub fn new(store: &'a IndexStore, embedder: &'a Embedder) -> Self {
        Self::with_defaults(store, embedder, RetrievalConfig::default())
    }

    /// Create a retriever whose [`Retriever::retrieve_default`] uses `config`.
    pub fn with_defaults(
        store: &'a IndexStore,
        embedder: &'a Embedder,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            defaults: config,
            include_metadata: true,
        }
    }

    /// Whether context entries carry a provenance header (default: on).
    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    /// Retrieve with the configured `top_k` and threshold.
    ///
    /// # Errors
    ///
    /// Same as [`Retriever::retrieve`].
    pub async fn retrieve_default(&self, query: &str) -> Result<RetrievalResult, CairaError> {
        self.retrieve(query, self.defaults.top_k, self.defaults.similarity_threshold)
            .await
    }

    /// Embed `query`, fetch the `top_k` nearest chunks and keep those whose
    /// similarity is at least `similarity_threshold`.
    ///
    /// Similarity is `1 - distance / max_distance` over the fetched
    /// candidates, so the farthest candidate always scores 0 and the scale
    /// depends on `top_k`. Scores are not comparable across queries.
    /// Each chunk's `rank` is its 1-based position among all candidates,
    /// before filtering.
    ///
    /// An empty result is not an error: `chunks` is empty and `context` is
    /// [`NO_RESULTS_CONTEXT`].
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::NotLoaded`] if the store holds no index, and
    /// propagates embedding and search failures.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult, CairaError> {
        if !self.store.is_loaded() {
            return Err(CairaError::NotLoaded);
        }

        let preview: String = query.chars().take(100).collect();
        tracing::info!(query = %preview, top_k, "retrieving context");

        let query_vector = self.embedder.embed_one(query).await?;
        let hits = self.store.search(&query_vector, top_k)?;

        let max_distance = hits
            .iter()
            .map(|&(_, d)| d)
            .fold(0.0f32, f32::max)
            .max(f32::EPSILON);

        let mut chunks = Vec::with_capacity(hits.len());
        for (i, (position, distance)) in hits.into_iter().enumerate() {
            let similarity = 1.0 - distance / max_distance;
            if similarity < similarity_threshold {
                continue;
            }
            let record = self.store.record(position).ok_or_else(|| {
                CairaError::CorruptIndex(format!("no metadata for vector {position}"))
            })?;
            chunks.push(ScoredChunk {
                rank: i + 1,
                position,
                distance,
                similarity,
                metadata: record.clone(),
            });
        }

        if chunks.is_empty() {
            tracing::warn!("no chunks passed the similarity threshold");
            return Ok(RetrievalResult {
                query: query.to_string(),
                chunks,
                context: NO_RESULTS_CONTEXT.to_string(),
            });
        }

        tracing::info!(chunks = chunks.len(), "retrieved relevant chunks");
        let context = format_context(&chunks, self.include_metadata);
        Ok(RetrievalResult {
            query: query.to_string(),
            chunks,
            context,
        })
    }
}

/// Render chunks as a numbered context block.
///
/// With `include_metadata`, each chunk is preceded by a
/// `[Document i] Source: <file> (Type: <type>)` header underlined with
/// dashes. Every entry ends with a blank line.
///
/// # Examples
///
/// ```
/// # use std::path::PathBuf;
/// # use caira_core::{ChunkMetadata, ChunkRecord, DocumentMetadata, ScoredChunk};
/// use caira_retrieval::format_context;
/// # let chunk = ScoredChunk {
/// #     rank: 1, position: 0, distance: 0.0, similarity: 1.0,
/// #     metadata: ChunkRecord {
/// #         metadata: ChunkMetadata {
/// #             document: DocumentMetadata {
/// #                 source_path: PathBuf::from("data/runbooks/db.md"),
/// #                 filename: "db.md".into(),
/// #                 doc_type: "runbooks".into(),
/// #                 size: 1,
/// #                 modified_time: String::new(),
/// #             },
/// #             chunk_id: 0, start_token: 0, end_token: 2, token_count: 2, total_chunks: 1,
/// #         },
/// #         chunk_text: "Restart postgres.".into(),
/// #     },
/// # };
///
/// let context = format_context(&[chunk], true);
/// assert!(context.starts_with("[Document 1] Source: db.md (Type: runbooks)\n---"));
/// assert!(context.contains("Restart postgres."));
/// ```
pub fn format_context(chunks: &[ScoredChunk], include_metadata: bool) -> String {
    let mut parts = Vec::with_capacity(chunks.len() * 4);
    for (i, chunk) in chunks.iter().enumerate() {
        let meta = &chunk.metadata.metadata.document;
        if include_metadata {
            let header = format!(
                "[Document {}] Source: {} (Type: {})",
                i + 1,
                meta.filename,
                meta.doc_type
            );
            let underline = "-".repeat(header.chars().count());
            parts.push(header);
            parts.push(underline);
        }
        parts.push(chunk.metadata.chunk_text.clone());
        parts.push(String::new());
    }
    parts.join("\n")
}
