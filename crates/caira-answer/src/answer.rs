use caira_core::{CairaError, ScoredChunk};
use caira_retrieval::Retriever;
use serde::Serialize;

use crate::llm::ChatBackend;
use crate::prompt::{build_messages, PromptVariant};

/// Reply used when retrieval finds nothing relevant.
pub const INSUFFICIENT_CONTEXT_REPLY: &str =
    "I don't have enough information in the knowledge base to answer this question.";

/// A generated answer with the evidence it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// The question asked.
    pub query: String,
    /// Model reply, or [`INSUFFICIENT_CONTEXT_REPLY`].
    pub response: String,
    /// Unique source filenames the context came from.
    pub sources: Vec<String>,
    /// Chunks that made up the context.
    pub chunks: Vec<ScoredChunk>,
    /// Whether the chat model was called.
    pub generated: bool,
}

/// Retrieve context for `query` and ask the chat model to answer from it.
///
/// When no chunk passes the retriever's threshold the model is not called
/// and the reply is [`INSUFFICIENT_CONTEXT_REPLY`].
///
/// # Errors
///
/// Propagates retrieval errors and [`CairaError::Llm`] from the backend.
pub async fn answer(
    retriever: &Retriever<'_>,
    llm: &dyn ChatBackend,
    query: &str,
    variant: PromptVariant,
) -> Result<Answer, CairaError> {
    let retrieval = retriever.retrieve_default(query).await?;

    if retrieval.chunks.is_empty() {
        tracing::info!("no relevant context, skipping generation");
        return Ok(Answer {
            query: query.to_string(),
            response: INSUFFICIENT_CONTEXT_REPLY.to_string(),
            sources: Vec::new(),
            chunks: Vec::new(),
            generated: false,
        });
    }

    let messages = build_messages(query, &retrieval.context, variant);
    tracing::info!(model = llm.model(), %variant, chunks = retrieval.chunks.len(), "generating answer");
    let response = llm.chat(messages).await?;

    Ok(Answer {
        query: query.to_string(),
        response,
        sources: retrieval.sources(),
        chunks: retrieval.chunks,
        generated: true,
    })
}
