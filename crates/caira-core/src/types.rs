use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Provenance of a loaded document.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use caira_core::DocumentMetadata;
///
/// let meta = DocumentMetadata {
///     source_path: PathBuf::from("data/runbooks/db.md"),
///     filename: "db.md".into(),
///     doc_type: "runbooks".into(),
///     size: 120,
///     modified_time: "2024-05-01T10:00:00+00:00".into(),
/// };
/// assert_eq!(meta.doc_type, "runbooks");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path the document was read from.
    pub source_path: PathBuf,
    /// File name (last component of `source_path`).
    pub filename: String,
    /// Corpus category, e.g. `"incidents"`, `"runbooks"`, `"logs"`.
    pub doc_type: String,
    /// Size on disk in bytes.
    pub size: u64,
    /// Last modification time, RFC 3339.
    pub modified_time: String,
}

/// A raw document with its provenance. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full text content.
    pub content: String,
    /// Where the content came from.
    pub metadata: DocumentMetadata,
}

/// Per-chunk metadata: the parent document's metadata plus token bookkeeping.
///
/// `end_token - start_token == token_count` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Metadata inherited from the parent document.
    #[serde(flatten)]
    pub document: DocumentMetadata,
    /// 0-based index of the chunk within its document.
    pub chunk_id: usize,
    /// First token of the chunk (inclusive).
    pub start_token: usize,
    /// One past the last token of the chunk.
    pub end_token: usize,
    /// Number of tokens in the chunk.
    pub token_count: usize,
    /// Number of chunks the parent document produced.
    pub total_chunks: usize,
}

/// A token-bounded segment of a document: the retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Decoded chunk text.
    pub text: String,
    /// 0-based index within the parent document.
    pub chunk_id: usize,
    /// Inherited and token metadata.
    pub metadata: ChunkMetadata,
}

/// A chunk paired with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// The chunk that was embedded.
    pub chunk: Chunk,
    /// Embedding of `chunk.text`.
    pub embedding: Vec<f32>,
}

/// One element of the persisted metadata array.
///
/// Position `i` in the metadata array describes vector `i` in the index.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use caira_core::{ChunkMetadata, ChunkRecord, DocumentMetadata};
///
/// let record = ChunkRecord {
///     metadata: ChunkMetadata {
///         document: DocumentMetadata {
///             source_path: PathBuf::from("data/logs/app.log.txt"),
///             filename: "app.log.txt".into(),
///             doc_type: "logs".into(),
///             size: 42,
///             modified_time: "2024-05-01T10:00:00+00:00".into(),
///         },
///         chunk_id: 0,
///         start_token: 0,
///         end_token: 9,
///         token_count: 9,
///         total_chunks: 1,
///     },
///     chunk_text: "ERROR connection pool exhausted".into(),
/// };
/// let json = serde_json::to_value(&record).unwrap();
/// assert_eq!(json["filename"], "app.log.txt");
/// assert_eq!(json["chunk_text"], "ERROR connection pool exhausted");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk and document metadata, flattened into the JSON object.
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
    /// Raw chunk text.
    pub chunk_text: String,
}

impl From<&Chunk> for ChunkRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            metadata: chunk.metadata.clone(),
            chunk_text: chunk.text.clone(),
        }
    }
}

/// A retrieved chunk with its ranking data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// 1-based rank among the nearest-neighbor candidates.
    pub rank: usize,
    /// Position of the vector in the index.
    pub position: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
    /// Within-batch normalized similarity in `[0, 1]`.
    pub similarity: f32,
    /// Stored metadata and text of the chunk.
    pub metadata: ChunkRecord,
}

impl ScoredChunk {
    /// Human-readable description of the chunk.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::path::PathBuf;
    /// # use caira_core::{ChunkMetadata, ChunkRecord, DocumentMetadata, ScoredChunk};
    /// # let record = ChunkRecord {
    /// #     metadata: ChunkMetadata {
    /// #         document: DocumentMetadata {
    /// #             source_path: PathBuf::from("data/runbooks/db.md"),
    /// #             filename: "db.md".into(),
    /// #             doc_type: "runbooks".into(),
    /// #             size: 1,
    /// #             modified_time: String::new(),
    /// #         },
    /// #         chunk_id: 1, start_token: 550, end_token: 1150, token_count: 600, total_chunks: 3,
    /// #     },
    /// #     chunk_text: String::new(),
    /// # };
    /// let scored = ScoredChunk { rank: 1, position: 4, distance: 0.2, similarity: 0.9, metadata: record };
    /// let details = scored.details();
    /// assert!(details.contains("Chunk ID: 1 / 3"));
    /// assert!(details.contains("Similarity: 0.900"));
    /// ```
    pub fn details(&self) -> String {
        let meta = &self.metadata.metadata;
        format!(
            "Chunk Details:\n\
             - Source: {}\n\
             - Type: {}\n\
             - Chunk ID: {} / {}\n\
             - Tokens: {}\n\
             - Similarity: {:.3}",
            meta.document.filename,
            meta.document.doc_type,
            meta.chunk_id,
            meta.total_chunks,
            meta.token_count,
            self.similarity,
        )
    }
}

/// Outcome of one retrieval: the query, surviving chunks, and assembled context.
///
/// Created per query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The query text.
    pub query: String,
    /// Chunks that passed the similarity threshold, nearest first.
    pub chunks: Vec<ScoredChunk>,
    /// Context block for a downstream generation call.
    pub context: String,
}

impl RetrievalResult {
    /// Unique source filenames, sorted.
    pub fn sources(&self) -> Vec<String> {
        self.chunks
            .iter()
            .map(|c| c.metadata.metadata.document.filename.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Compact serializable view of the result.
    pub fn summary(&self) -> RetrievalSummary {
        RetrievalSummary {
            query: self.query.clone(),
            num_chunks: self.chunks.len(),
            sources: self.sources(),
            context: self.context.clone(),
        }
    }
}

/// Serializable overview of a [`RetrievalResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalSummary {
    /// The query text.
    pub query: String,
    /// Number of chunks retrieved.
    pub num_chunks: usize,
    /// Unique source filenames.
    pub sources: Vec<String>,
    /// Assembled context block.
    pub context: String,
}

/// Aggregate token statistics over a set of chunks.
///
/// # Examples
///
/// ```
/// use caira_core::ChunkStats;
///
/// let stats = ChunkStats::from_token_counts(&[10, 20, 30]).unwrap();
/// assert_eq!(stats.total_chunks, 3);
/// assert_eq!(stats.avg_tokens, 20.0);
/// assert!(ChunkStats::from_token_counts(&[]).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStats {
    /// Number of chunks.
    pub total_chunks: usize,
    /// Mean tokens per chunk.
    pub avg_tokens: f64,
    /// Smallest chunk in tokens.
    pub min_tokens: usize,
    /// Largest chunk in tokens.
    pub max_tokens: usize,
    /// Sum of tokens over all chunks.
    pub total_tokens: usize,
}

impl ChunkStats {
    /// Aggregate a list of per-chunk token counts. `None` when empty.
    pub fn from_token_counts(counts: &[usize]) -> Option<Self> {
        let min_tokens = *counts.iter().min()?;
        let max_tokens = *counts.iter().max()?;
        let total_tokens: usize = counts.iter().sum();
        Some(Self {
            total_chunks: counts.len(),
            avg_tokens: total_tokens as f64 / counts.len() as f64,
            min_tokens,
            max_tokens,
            total_tokens,
        })
    }
}

/// Size of a built or loaded index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Vectors in the flat index.
    pub total_vectors: usize,
    /// Dimension of every vector.
    pub dimension: usize,
    /// Entries in the metadata array.
    pub metadata_count: usize,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use caira_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
