//! Deterministic BPE tokenization for chunk sizing.

use std::sync::{Arc, OnceLock};

use caira_core::CairaError;
use tiktoken_rs::CoreBPE;

/// Converts text to token ids and back.
///
/// Implementations must be deterministic: the same text always encodes to
/// the same ids.
pub trait Tokenizer: Send + Sync {
    /// Encode `text` into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back to text.
    ///
    /// # Errors
    ///
    /// Fails when the ids do not form valid UTF-8, e.g. when a slice starts
    /// or ends inside a multi-byte character.
    fn decode(&self, tokens: &[u32]) -> Result<String, CairaError>;
}

/// The `cl100k_base` encoding used by GPT-4 class models.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl std::fmt::Debug for Cl100kTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cl100kTokenizer").finish_non_exhaustive()
    }
}

impl Cl100kTokenizer {
    /// Build a fresh tokenizer. Prefer [`shared_cl100k`], which builds once.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Config`] if the encoding cannot be loaded.
    pub fn new() -> Result<Self, CairaError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| CairaError::Config(format!("failed to load cl100k_base tokenizer: {e}")))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as u32)
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, CairaError> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .map_err(|e| CairaError::InvalidInput(format!("token slice is not valid UTF-8: {e}")))
    }
}

static CL100K: OnceLock<Arc<Cl100kTokenizer>> = OnceLock::new();

/// Process-wide `cl100k_base` tokenizer.
///
/// Built lazily on first call and reused for the rest of the process. Pass
/// the returned handle into [`crate::chunker::Chunker::new`].
///
/// # Errors
///
/// Returns [`CairaError::Config`] if the encoding cannot be loaded.
///
/// # Examples
///
/// ```
/// use caira_ingest::tokenizer::{shared_cl100k, Tokenizer};
///
/// let tokenizer = shared_cl100k().unwrap();
/// let tokens = tokenizer.encode("database connection timeout");
/// assert!(!tokens.is_empty());
/// assert_eq!(tokenizer.decode(&tokens).unwrap(), "database connection timeout");
/// ```
pub fn shared_cl100k() -> Result<Arc<Cl100kTokenizer>, CairaError> {
    if let Some(tokenizer) = CL100K.get() {
        return Ok(Arc::clone(tokenizer));
    }
    let built = Arc::new(Cl100kTokenizer::new()?);
    Ok(Arc::clone(CL100K.get_or_init(|| built)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic() {
        let tokenizer = shared_cl100k().unwrap();
        let text = "Restart the payment service after draining the queue.";
        assert_eq!(tokenizer.encode(text), tokenizer.encode(text));
    }

    #[test]
    fn empty_text_has_no_tokens() {
        let tokenizer = shared_cl100k().unwrap();
        assert!(tokenizer.encode("").is_empty());
    }

    #[test]
    fn shared_instance_is_reused() {
        let a = shared_cl100k().unwrap();
        let b = shared_cl100k().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn roundtrip_preserves_unicode() {
        let tokenizer = shared_cl100k().unwrap();
        let text = "Fehler: Verbindung zum Server fehlgeschlagen. 数据库超时";
        let tokens = tokenizer.encode(text);
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
    }
}
