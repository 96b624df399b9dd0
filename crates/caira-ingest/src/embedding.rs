//! Embedding client for OpenAI-compatible embedding APIs.
//!
//! [`HttpEmbeddingProvider`] performs single requests; [`Embedder`] layers
//! retry with backoff, batching, dimension checks and progress counting on
//! top of any [`EmbeddingProvider`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use caira_core::{CairaError, Chunk, EmbeddedChunk, EmbeddingConfig};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// A service that turns one text into one vector.
///
/// Implementations signal rate limiting with [`CairaError::RateLimited`] so
/// the [`Embedder`] can back off and retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CairaError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// # Examples
///
/// ```
/// use caira_ingest::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
///
/// let provider = HttpEmbeddingProvider::new("test-key", "text-embedding-3-small");
/// assert_eq!(provider.model(), "text-embedding-3-small");
/// ```
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
}

impl std::fmt::Debug for HttpEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

impl HttpEmbeddingProvider {
    /// Create a provider against the default OpenAI base URL.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: build_client(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            dimensions: None,
        }
    }

    /// Create a provider from an [`EmbeddingConfig`].
    ///
    /// The key is taken from the config, then `CAIRA_EMBEDDING_API_KEY`, then
    /// `OPENAI_API_KEY`. The configured dimension is sent with each request.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] if no API key is available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use caira_core::EmbeddingConfig;
    /// use caira_ingest::embedding::HttpEmbeddingProvider;
    ///
    /// let provider = HttpEmbeddingProvider::with_config(&EmbeddingConfig::default()).unwrap();
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, CairaError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("CAIRA_EMBEDDING_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CairaError::Config(
                    "embedding API key not found: set embedding.api_key in .caira.toml, CAIRA_EMBEDDING_API_KEY or OPENAI_API_KEY".into(),
                )
            })?;

        Ok(Self {
            client: build_client(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.clone(),
            dimensions: Some(config.dimensions),
        })
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CairaError> {
        let request = EmbedRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| CairaError::Embedding(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(CairaError::RateLimited(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(CairaError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CairaError::Embedding(format!("failed to parse response: {e}")))?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| CairaError::Embedding("empty embedding response".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Turns texts into vectors through an [`EmbeddingProvider`].
///
/// Rate-limited calls are retried per the [`RetryPolicy`]. All vectors
/// produced by one embedder must share a dimension.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use caira_ingest::embedding::{Embedder, HttpEmbeddingProvider};
/// use caira_ingest::retry::RetryPolicy;
///
/// let embedder = Embedder::new(
///     HttpEmbeddingProvider::new("key", "text-embedding-3-small"),
///     RetryPolicy::default(),
///     Duration::from_millis(100),
/// );
/// assert_eq!(embedder.embedded_count(), 0);
/// ```
pub struct Embedder {
    provider: Box<dyn EmbeddingProvider>,
    policy: RetryPolicy,
    request_delay: Duration,
    expected_dimension: Option<usize>,
    embedded: AtomicUsize,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.provider.model())
            .field("policy", &self.policy)
            .field("request_delay", &self.request_delay)
            .field("expected_dimension", &self.expected_dimension)
            .finish_non_exhaustive()
    }
}

impl Embedder {
    /// Wrap a provider with a retry policy and an inter-batch delay.
    pub fn new<P>(provider: P, policy: RetryPolicy, request_delay: Duration) -> Self
    where
        P: EmbeddingProvider + 'static,
    {
        Self {
            provider: Box::new(provider),
            policy,
            request_delay,
            expected_dimension: None,
            embedded: AtomicUsize::new(0),
        }
    }

    /// Require every vector to have exactly `dimension` components.
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    /// HTTP-backed embedder configured from the `[embedding]` section.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] if no API key is available.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, CairaError> {
        let provider = HttpEmbeddingProvider::with_config(config)?;
        Ok(Self::new(
            provider,
            RetryPolicy::from_config(config),
            Duration::from_millis(config.request_delay_ms),
        )
        .with_expected_dimension(config.dimensions))
    }

    /// Model identifier of the underlying provider.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Texts embedded successfully by this embedder so far.
    pub fn embedded_count(&self) -> usize {
        self.embedded.load(Ordering::Relaxed)
    }

    /// Embed one text, retrying on rate limits.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Embedding`] when the service fails, the retry
    /// budget is exhausted, or the vector has the wrong dimension.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, CairaError> {
        let vector = self.policy.run(|| self.provider.embed(text)).await?;

        if let Some(expected) = self.expected_dimension {
            if vector.len() != expected {
                return Err(CairaError::Embedding(format!(
                    "expected {expected}-dimensional embedding, got {}",
                    vector.len()
                )));
            }
        }

        self.embedded.fetch_add(1, Ordering::Relaxed);
        Ok(vector)
    }

    /// Embed many texts. Output order matches input order.
    ///
    /// Texts in one batch are requested concurrently; consecutive batches
    /// are separated by the configured delay.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::InvalidInput`] if `batch_size` is zero, and
    /// [`CairaError::Embedding`] on service failure or when the vectors do not
    /// all share one dimension.
    pub async fn embed_many(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, CairaError> {
        if batch_size == 0 {
            return Err(CairaError::InvalidInput("batch_size must be positive".into()));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let total_batches = texts.len().div_ceil(batch_size);
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size).enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let vectors =
                futures::future::try_join_all(batch.iter().map(|text| self.embed_one(text)))
                    .await?;
            all_embeddings.extend(vectors);

            tracing::info!(
                batch = i + 1,
                total_batches,
                embedded = all_embeddings.len(),
                total = texts.len(),
                "embedded batch"
            );
        }

        if let Some(first) = all_embeddings.first() {
            let dimension = first.len();
            if let Some(bad) = all_embeddings.iter().find(|v| v.len() != dimension) {
                return Err(CairaError::Embedding(format!(
                    "inconsistent embedding dimensions: {dimension} and {}",
                    bad.len()
                )));
            }
        }

        Ok(all_embeddings)
    }

    /// Embed the text of every chunk and pair each chunk with its vector.
    ///
    /// # Errors
    ///
    /// Same as [`Embedder::embed_many`].
    pub async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        batch_size: usize,
    ) -> Result<Vec<EmbeddedChunk>, CairaError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed_many(&texts, batch_size).await?;
        Ok(chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect())
    }
}
