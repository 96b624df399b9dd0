//! Document ingestion: loading, token chunking, and embedding.
//!
//! Turns a folder of incident reports, runbooks and logs into token-bounded,
//! overlapping chunks, and chunks into vectors via a remote embedding service
//! with bounded rate-limit backoff.

pub mod chunker;
pub mod embedding;
pub mod loader;
pub mod retry;
pub mod tokenizer;
