//! Query-time retrieval and index building.
//!
//! [`retriever::Retriever`] embeds a query, finds the nearest chunks in an
//! [`caira_index::IndexStore`], scores and filters them, and assembles a
//! context block for generation. [`pipeline::build_index`] runs the
//! load, chunk, embed, build and persist steps that produce the store.

pub mod pipeline;
pub mod retriever;

pub use pipeline::{build_index, BuildReport};
pub use retriever::{format_context, Retriever, NO_RESULTS_CONTEXT};
