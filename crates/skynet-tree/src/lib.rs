//! skynet-tree
//!
//! Query-free views of the corpus: the hierarchical topic tree (seeded
//! k-means over per-document mean vectors, TF-IDF labels), its shared cache,
//! and the future-work / follow-up helpers used when browsing a paper.

pub mod builder;
pub mod cache;
pub mod followups;
pub mod future_work;
pub mod kmeans;
pub mod labels;
pub mod tokenize;

pub use builder::{TopicTree, TopicTreeBuilder, TreeOptions};
pub use cache::TopicTreeCache;
pub use followups::{find_followups, Followup, FollowupOptions};
pub use future_work::{extract_future_work, FutureWorkItem};
pub use kmeans::Kmeans;
