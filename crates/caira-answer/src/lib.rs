//! Grounded answer generation for incident queries.
//!
//! Combines retrieved context with an incident-response system prompt and
//! sends it to an OpenAI-compatible chat model.

pub mod answer;
pub mod llm;
pub mod prompt;

pub use answer::{answer, Answer, INSUFFICIENT_CONTEXT_REPLY};
pub use llm::{ChatBackend, ChatMessage, LlmClient, Role};
pub use prompt::PromptVariant;
