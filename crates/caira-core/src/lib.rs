//! Core types, configuration, and error handling for C-AIRA.
//!
//! This crate provides the shared foundation used by all other C-AIRA crates:
//! - [`CairaError`]: unified error type using `thiserror` and `miette`
//! - [`CairaConfig`]: configuration loaded from `.caira.toml`
//! - Shared types: [`Document`], [`Chunk`], [`EmbeddedChunk`], [`ChunkRecord`],
//!   [`ScoredChunk`], [`RetrievalResult`], [`ChunkStats`], [`IndexStats`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CairaConfig, ChunkingConfig, EmbeddingConfig, LlmConfig, PathsConfig, RetrievalConfig,
};
pub use error::CairaError;
pub use types::{
    Chunk, ChunkMetadata, ChunkRecord, ChunkStats, Document, DocumentMetadata, EmbeddedChunk,
    IndexStats, OutputFormat, RetrievalResult, RetrievalSummary, ScoredChunk,
};
