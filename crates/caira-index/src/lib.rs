//! Flat exact-search vector index with a parallel metadata table.
//!
//! Vector `i` in the index and element `i` of the metadata array always
//! describe the same chunk. The index is persisted as a checksummed binary
//! file next to a JSON metadata array, and searched by exact squared
//! Euclidean distance.

pub mod codec;
pub mod store;

pub use store::IndexStore;
