//! skynet-vector
//!
//! In-memory, immutable chunk vector store with exact cosine search.

pub mod search;
pub mod store;

pub use search::{cosine_similarity, dot, l2_norm};
pub use store::VectorStore;
