use std::path::PathBuf;

/// Errors that can occur across the C-AIRA pipeline.
///
/// Library crates return this type directly; the binary converts it to a
/// [`miette::Report`] at the boundary.
///
/// # Examples
///
/// ```
/// use caira_core::CairaError;
///
/// let err = CairaError::Config("chunk_size must be positive".into());
/// assert!(err.to_string().contains("chunk_size"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CairaError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(caira::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration, including an unavailable tokenizer.
    #[error("configuration error: {0}")]
    #[diagnostic(code(caira::config), help("check .caira.toml and CAIRA_* environment variables"))]
    Config(String),

    /// The embedding service failed, exhausted its retries, or returned
    /// vectors of inconsistent dimension.
    #[error("embedding service error: {0}")]
    #[diagnostic(code(caira::embedding))]
    Embedding(String),

    /// The embedding service signalled rate limiting.
    ///
    /// Retried inside the embedder and never returned from it.
    #[error("rate limited: {0}")]
    #[diagnostic(code(caira::rate_limited))]
    RateLimited(String),

    /// Parallel input sequences disagree, or an input is unusable.
    #[error("invalid input: {0}")]
    #[diagnostic(code(caira::invalid_input))]
    InvalidInput(String),

    /// A vector does not have the dimension of the index it is used with.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(caira::dimension_mismatch),
        help("query and index must be embedded with the same model")
    )]
    DimensionMismatch {
        /// Dimension of the index (or of the first vector seen).
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// A persisted artifact does not exist.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(caira::not_found), help("run `caira index` to build the vector store"))]
    NotFound(PathBuf),

    /// The persisted index and metadata disagree, or the index file is malformed.
    #[error("corrupt index: {0}")]
    #[diagnostic(code(caira::corrupt_index), help("rebuild with `caira index`"))]
    CorruptIndex(String),

    /// An index operation was called before `build` or `load`.
    #[error("index not loaded: call build or load first")]
    #[diagnostic(code(caira::not_loaded))]
    NotLoaded,

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    #[diagnostic(code(caira::llm))]
    Llm(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(caira::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(caira::toml))]
    Toml(#[from] toml::de::Error),
}
