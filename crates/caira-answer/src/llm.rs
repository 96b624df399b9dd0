use std::time::Duration;

use async_trait::async_trait;
use caira_core::{CairaError, LlmConfig};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use caira_answer::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "How do I restart the payment service?".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use caira_answer::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// Anything that can complete a chat conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `messages` and return the assistant's reply text.
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, CairaError>;

    /// Model identifier, for display.
    fn model(&self) -> &str;
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Azure-fronted gateways, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use caira_core::LlmConfig;
/// use caira_answer::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// Without a key in the config, `CAIRA_LLM_API_KEY` and then
    /// `OPENAI_API_KEY` are consulted. Keyless clients are allowed for local
    /// servers.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, CairaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CairaError::Llm(format!("failed to create HTTP client: {e}")))?;

        let mut config = config.clone();
        if config.api_key.is_none() {
            config.api_key = std::env::var("CAIRA_LLM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        Ok(Self { client, config })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "top_p": self.config.top_p,
        })
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    /// Posts to `{base_url}/v1/chat/completions` with the configured
    /// temperature, `max_tokens` and `top_p`.
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, CairaError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let url = format!("{base_url}/v1/chat/completions");

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        tracing::debug!(model = %self.config.model, messages = messages.len(), "sending chat request");
        let response = request
            .json(&self.request_body(&messages))
            .send()
            .await
            .map_err(|e| CairaError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CairaError::Llm(format!("LLM API error {status}: {body_text}")));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CairaError::Llm(format!("failed to parse response: {e}")))?;

        extract_content(&response_body)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Pull `choices[0].message.content` out of a chat completion.
fn extract_content(body: &serde_json::Value) -> Result<String, CairaError> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| CairaError::Llm(format!("unexpected response structure: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_returns_config_model() {
        let config = LlmConfig {
            model: "gpt-4o-mini".into(),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn request_body_carries_sampling_settings() {
        let config = LlmConfig {
            api_key: Some("k".into()),
            temperature: 0.3,
            max_tokens: 256,
            top_p: 0.9,
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        let body = client.request_body(&[ChatMessage {
            role: Role::User,
            content: "hi".into(),
        }]);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn extracts_first_choice() {
        let body = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "1. Drain the queue." } }
            ]
        });
        assert_eq!(extract_content(&body).unwrap(), "1. Drain the queue.");
    }

    #[test]
    fn malformed_response_is_llm_error() {
        let body = serde_json::json!({ "error": { "message": "quota" } });
        assert!(matches!(extract_content(&body), Err(CairaError::Llm(_))));
    }

    #[test]
    fn debug_hides_api_key() {
        let config = LlmConfig {
            api_key: Some("sk-hidden".into()),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert!(!format!("{client:?}").contains("sk-hidden"));
    }

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::System,
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }
}
