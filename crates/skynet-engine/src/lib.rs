//! skynet-engine
//!
//! Service facade over the loaded corpus: query embedding, role-aware
//! ranking, summary orchestration with graceful degradation, and the
//! browsing views (topic tree, trending, future work, follow-ups).

pub mod engine;
pub mod summarize;

pub use engine::{
    fallback_summary, ChunkMatch, ChunkPreview, Health, KnowledgeEngine, SearchRequest, SearchResponse, SearchResult, TrendingItem, DEFAULT_TRENDING,
    NO_RESULTS_SUMMARY,
};
pub use summarize::OpenAiSummarizer;
