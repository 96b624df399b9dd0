//! Token-window chunking with overlap.
//!
//! Splits each document into windows of at most `chunk_size` tokens, where
//! consecutive windows share `chunk_overlap` tokens. Every chunk carries its
//! parent document's metadata plus its token range, so chunk text can always
//! be traced back to the exact span it came from.

use std::sync::Arc;

use caira_core::{CairaError, Chunk, ChunkMetadata, ChunkStats, ChunkingConfig, Document};

use crate::tokenizer::{shared_cl100k, Tokenizer};

/// Tokens a decode may widen past a range boundary that splits a character.
const MAX_DECODE_WIDEN: usize = 3;

/// Splits documents into overlapping token windows.
///
/// # Examples
///
/// ```
/// use caira_core::ChunkingConfig;
/// use caira_ingest::chunker::Chunker;
///
/// let chunker = Chunker::with_default_tokenizer(ChunkingConfig {
///     chunk_size: 600,
///     chunk_overlap: 50,
/// })
/// .unwrap();
/// assert_eq!(chunker.chunk_size(), 600);
/// ```
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish_non_exhaustive()
    }
}

impl Chunker {
    /// Create a chunker over an explicit tokenizer.
    ///
    /// An overlap of `chunk_size` or more is accepted; the window then
    /// advances by a full chunk so chunking still terminates.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] if `chunk_size` is zero.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: ChunkingConfig) -> Result<Self, CairaError> {
        if config.chunk_size == 0 {
            return Err(CairaError::Config("chunk_size must be positive".into()));
        }
        tracing::debug!(
            chunk_size = config.chunk_size,
            chunk_overlap = config.chunk_overlap,
            "initialized chunker"
        );
        Ok(Self {
            tokenizer,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        })
    }

    /// Create a chunker over the shared `cl100k_base` tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] if the tokenizer is unavailable or
    /// `chunk_size` is zero.
    pub fn with_default_tokenizer(config: ChunkingConfig) -> Result<Self, CairaError> {
        Self::new(shared_cl100k()?, config)
    }

    /// Maximum tokens per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Tokens shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Number of tokens in `text`.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.encode(text).len()
    }

    /// Split one document into chunks, in ascending `start_token` order.
    ///
    /// Empty content yields no chunks. Every returned chunk reports the same
    /// `total_chunks`, equal to the number of chunks returned.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::InvalidInput`] if a chunk's tokens cannot be
    /// decoded back to text.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use caira_core::{ChunkingConfig, Document, DocumentMetadata};
    /// use caira_ingest::chunker::Chunker;
    ///
    /// let chunker = Chunker::with_default_tokenizer(ChunkingConfig {
    ///     chunk_size: 50,
    ///     chunk_overlap: 5,
    /// })
    /// .unwrap();
    /// let doc = Document {
    ///     content: "Disk full on db-01; rotated logs and freed 40GB.".into(),
    ///     metadata: DocumentMetadata {
    ///         source_path: PathBuf::from("data/incidents/inc-17.md"),
    ///         filename: "inc-17.md".into(),
    ///         doc_type: "incidents".into(),
    ///         size: 48,
    ///         modified_time: "2024-05-01T10:00:00+00:00".into(),
    ///     },
    /// };
    /// let chunks = chunker.chunk(&doc).unwrap();
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(chunks[0].metadata.total_chunks, 1);
    /// ```
    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>, CairaError> {
        let tokens = self.tokenizer.encode(&document.content);
        let total_tokens = tokens.len();

        tracing::debug!(
            filename = %document.metadata.filename,
            total_tokens,
            "chunking document"
        );

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_tokens {
            let end = (start + self.chunk_size).min(total_tokens);
            let text = self.decode_span(&tokens, start, end)?;
            let chunk_id = chunks.len();

            chunks.push(Chunk {
                text,
                chunk_id,
                metadata: ChunkMetadata {
                    document: document.metadata.clone(),
                    chunk_id,
                    start_token: start,
                    end_token: end,
                    token_count: end - start,
                    total_chunks: 0,
                },
            });

            if end == total_tokens {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        let total_chunks = chunks.len();
        for chunk in &mut chunks {
            chunk.metadata.total_chunks = total_chunks;
        }

        tracing::debug!(
            filename = %document.metadata.filename,
            chunks = total_chunks,
            "created chunks"
        );
        Ok(chunks)
    }

    /// Chunk several documents, preserving document order and chunk order.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`Chunker::chunk`].
    pub fn chunk_many(&self, documents: &[Document]) -> Result<Vec<Chunk>, CairaError> {
        let mut all_chunks = Vec::new();
        for document in documents {
            all_chunks.extend(self.chunk(document)?);
        }
        tracing::info!(
            documents = documents.len(),
            chunks = all_chunks.len(),
            "chunked documents"
        );
        Ok(all_chunks)
    }

    /// Token statistics over `chunks`; `None` when there are none.
    pub fn stats(chunks: &[Chunk]) -> Option<ChunkStats> {
        let counts: Vec<usize> = chunks.iter().map(|c| c.metadata.token_count).collect();
        ChunkStats::from_token_counts(&counts)
    }

    /// Decode `tokens[start..end]`, widening past a split character if needed.
    fn decode_span(&self, tokens: &[u32], start: usize, end: usize) -> Result<String, CairaError> {
        let mut last_err = None;
        for widen_end in 0..=MAX_DECODE_WIDEN {
            for widen_start in 0..=MAX_DECODE_WIDEN {
                let lo = start.saturating_sub(widen_start);
                let hi = (end + widen_end).min(tokens.len());
                match self.tokenizer.decode(&tokens[lo..hi]) {
                    Ok(text) => return Ok(text),
                    Err(e) => last_err = Some(e),
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            CairaError::InvalidInput(format!("cannot decode tokens {start}..{end}"))
        }))
    }
}
