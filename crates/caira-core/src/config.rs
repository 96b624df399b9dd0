use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CairaError;

/// Top-level configuration loaded from `.caira.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use caira_core::CairaConfig;
///
/// let config = CairaConfig::default();
/// assert_eq!(config.chunking.chunk_size, 600);
/// assert_eq!(config.retrieval.top_k, 5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CairaConfig {
    /// Embedding service settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Chat model settings for answer generation.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Token chunking settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Query-time retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Corpus and vector store locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

impl CairaConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Io`] if the file cannot be read, or
    /// [`CairaError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use caira_core::CairaConfig;
    /// use std::path::Path;
    ///
    /// let config = CairaConfig::from_file(Path::new(".caira.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, CairaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use caira_core::CairaConfig;
    ///
    /// let toml = r#"
    /// [chunking]
    /// chunk_size = 300
    /// chunk_overlap = 30
    /// "#;
    /// let config = CairaConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.chunking.chunk_size, 300);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CairaError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `CAIRA_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] if a numeric variable does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), CairaError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognised keys: `CAIRA_EMBEDDING_MODEL`, `CAIRA_EMBEDDING_BASE_URL`,
    /// `CAIRA_EMBEDDING_DIMENSIONS`, `CAIRA_LLM_MODEL`, `CAIRA_LLM_BASE_URL`,
    /// `CAIRA_CHUNK_SIZE`, `CAIRA_CHUNK_OVERLAP`, `CAIRA_TOP_K`,
    /// `CAIRA_SIMILARITY_THRESHOLD`, `CAIRA_DATA_DIR`.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] if a numeric value does not parse.
    ///
    /// # Examples
    ///
    /// ```
    /// use caira_core::CairaConfig;
    ///
    /// let mut config = CairaConfig::default();
    /// config
    ///     .apply_overrides_from(|key| (key == "CAIRA_TOP_K").then(|| "8".to_string()))
    ///     .unwrap();
    /// assert_eq!(config.retrieval.top_k, 8);
    /// ```
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), CairaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CAIRA_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("CAIRA_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Some(v) = lookup("CAIRA_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = parse_var("CAIRA_EMBEDDING_DIMENSIONS", &v)?;
        }
        if let Some(v) = lookup("CAIRA_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("CAIRA_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = lookup("CAIRA_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_var("CAIRA_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CAIRA_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_var("CAIRA_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("CAIRA_TOP_K") {
            self.retrieval.top_k = parse_var("CAIRA_TOP_K", &v)?;
        }
        if let Some(v) = lookup("CAIRA_SIMILARITY_THRESHOLD") {
            self.retrieval.similarity_threshold = parse_var("CAIRA_SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("CAIRA_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Check that all sections hold usable values.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] describing the first invalid setting.
    ///
    /// # Examples
    ///
    /// ```
    /// use caira_core::CairaConfig;
    ///
    /// let mut config = CairaConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.chunking.chunk_overlap = config.chunking.chunk_size;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), CairaError> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        if self.embedding.batch_size == 0 {
            return Err(CairaError::Config("embedding.batch_size must be positive".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(CairaError::Config("embedding.dimensions must be positive".into()));
        }
        if self.embedding.max_retries == 0 {
            return Err(CairaError::Config("embedding.max_retries must be at least 1".into()));
        }
        Ok(())
    }

    /// Human-readable summary of the effective settings, without secrets.
    pub fn summary(&self) -> String {
        format!(
            "Embedding model: {} ({} dims)\n\
             LLM model: {}\n\
             Chunk size: {} tokens\n\
             Chunk overlap: {} tokens\n\
             Top-K results: {}\n\
             Similarity threshold: {}\n\
             Temperature: {}\n\
             Data dir: {}\n\
             Index: {}\n",
            self.embedding.model,
            self.embedding.dimensions,
            self.llm.model,
            self.chunking.chunk_size,
            self.chunking.chunk_overlap,
            self.retrieval.top_k,
            self.retrieval.similarity_threshold,
            self.llm.temperature,
            self.paths.data_dir.display(),
            self.paths.index_path.display(),
        )
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, CairaError> {
    value
        .trim()
        .parse()
        .map_err(|_| CairaError::Config(format!("{key} has an invalid value: '{value}'")))
}

/// Embedding service configuration.
///
/// # Examples
///
/// ```
/// use caira_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.model, "text-embedding-3-small");
/// assert_eq!(config.dimensions, 1024);
/// assert_eq!(config.batch_size, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key for the embedding service.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible embeddings API.
    pub base_url: Option<String>,
    /// Model name (default: `"text-embedding-3-small"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector dimension every embedding must have (default: 1024).
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Texts embedded per batch (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches in milliseconds (default: 100).
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Attempts per text before giving up on rate limiting (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff unit in milliseconds; attempt `n` waits `base * 2^n` (default: 1000).
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_embedding_dimensions() -> usize {
    1024
}

fn default_batch_size() -> usize {
    10
}

fn default_request_delay_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            batch_size: default_batch_size(),
            request_delay_ms: default_request_delay_ms(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

/// Chat model configuration for answer generation.
///
/// # Examples
///
/// ```
/// use caira_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// assert_eq!(config.max_tokens, 1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier.
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Sampling temperature (default: 0.1).
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Maximum tokens to generate (default: 1000).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Nucleus sampling parameter (default: 0.95).
    #[serde(default = "default_top_p")]
    pub top_p: f64,
}

fn default_llm_model() -> String {
    "gpt-4o".into()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_top_p() -> f64 {
    0.95
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

/// Token chunking configuration.
///
/// # Examples
///
/// ```
/// use caira_core::ChunkingConfig;
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.chunk_size, 600);
/// assert_eq!(config.chunk_overlap, 50);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk (default: 600).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks (default: 50).
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    600
}

fn default_chunk_overlap() -> usize {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    /// Enforce `chunk_size > 0` and `chunk_overlap < chunk_size`.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] when either constraint fails.
    pub fn validate(&self) -> Result<(), CairaError> {
        if self.chunk_size == 0 {
            return Err(CairaError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(CairaError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Query-time retrieval configuration.
///
/// # Examples
///
/// ```
/// use caira_core::RetrievalConfig;
///
/// let config = RetrievalConfig::default();
/// assert_eq!(config.top_k, 5);
/// assert_eq!(config.similarity_threshold, 0.7);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of nearest chunks to fetch (default: 5).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum within-batch similarity to keep a chunk (default: 0.7).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_top_k() -> usize {
    5
}

fn default_similarity_threshold() -> f32 {
    0.7
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl RetrievalConfig {
    /// Enforce `top_k > 0` and a threshold within `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] when either constraint fails.
    pub fn validate(&self) -> Result<(), CairaError> {
        if self.top_k == 0 {
            return Err(CairaError::Config("top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CairaError::Config(format!(
                "similarity_threshold must be between 0 and 1, got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Locations of the document corpus and the persisted vector store.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use caira_core::PathsConfig;
///
/// let config = PathsConfig::default();
/// assert_eq!(config.data_dir, PathBuf::from("data"));
/// assert_eq!(config.metadata_path, PathBuf::from("vector_store/metadata.json"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the `incidents/`, `runbooks/` and `logs/` folders.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Binary vector index file.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    /// JSON metadata array parallel to the index.
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("vector_store/index.bin")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("vector_store/metadata.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            index_path: default_index_path(),
            metadata_path: default_metadata_path(),
        }
    }
}
