use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use skynet_core::config::{Config, Settings};
use skynet_core::traits::{ChatTurn, DocumentDigest, Embedder, Summarizer};
use skynet_core::{Error, RankedDocument, Result, Role, Section};
use skynet_embed::get_default_embedder;
use skynet_rank::Ranker;
use skynet_tree::{
    extract_future_work, find_followups, future_work, FollowupOptions, Followup, FutureWorkItem, TopicTree, TopicTreeBuilder,
    TopicTreeCache, TreeOptions,
};
use skynet_vector::VectorStore;

use crate::summarize::OpenAiSummarizer;

pub const NO_RESULTS_SUMMARY: &str = "No documents found for your query.";
const PREVIEW_CHARS: usize = 200;
const TRENDING_PREVIEW_CHARS: usize = 150;
const TRENDING_SCAN_CHUNKS: usize = 100;
pub const DEFAULT_TRENDING: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Any role label; unknown labels fall back to Researcher.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub top_docs: Option<usize>,
    #[serde(default, alias = "messages")]
    pub history: Vec<ChatTurn>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, role: impl Into<String>) -> Self {
        Self { query: query.into(), role: role.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkPreview {
    pub text: String,
    pub section: Section,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMatch {
    pub index: usize,
    pub chunk_id: String,
    pub doc_id: String,
    pub pmcid: String,
    pub section: Section,
    pub similarity: f32,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub pmcid: String,
    pub url: String,
    pub score: f32,
    pub chunk_count: usize,
    pub top_chunks: Vec<ChunkPreview>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub summary: String,
    pub count: usize,
    pub query: String,
    pub role: Role,
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingItem {
    pub id: String,
    pub title: String,
    pub pmcid: String,
    pub url: String,
    pub section: Section,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub chunks_loaded: usize,
    pub dim: usize,
    pub documents: usize,
    pub embedder: Option<String>,
    pub summarizer: bool,
    pub tree_cached: bool,
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

pub fn fallback_summary(count: usize) -> String { format!("Found {count} relevant documents for your query.") }

/// Everything the service layer needs: one loaded store plus the optional
/// external collaborators.
pub struct KnowledgeEngine {
    store: Arc<VectorStore>,
    ranker: Ranker,
    embedder: Option<Box<dyn Embedder>>,
    summarizer: Option<Box<dyn Summarizer>>,
    tree: TopicTreeCache,
    followups: FollowupOptions,
    preview_chunks: usize,
    max_chunks_per_doc: usize,
}

impl KnowledgeEngine {
    pub fn new(store: Arc<VectorStore>, ranker: Ranker) -> Self {
        Self {
            store,
            ranker,
            embedder: None,
            summarizer: None,
            tree: TopicTreeCache::default(),
            followups: FollowupOptions::default(),
            preview_chunks: 3,
            max_chunks_per_doc: 3,
        }
    }

    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_tree_builder(mut self, builder: TopicTreeBuilder) -> Self {
        self.tree = TopicTreeCache::new(builder);
        self
    }

    pub fn with_followup_options(mut self, options: FollowupOptions) -> Self {
        self.followups = options;
        self
    }

    /// Load the corpus and wire collaborators from configuration. A missing
    /// embedder or summarizer degrades the engine instead of failing it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings()?;
        let base = config.base_dir();
        let store = VectorStore::load(
            &settings.corpus.embeddings_path(base),
            &settings.corpus.metadata_path(base),
            settings.corpus.expected_dim,
        )?;
        Self::from_settings(Arc::new(store), &settings)
    }

    pub fn from_settings(store: Arc<VectorStore>, settings: &Settings) -> Result<Self> {
        let mut engine = Self::new(Arc::clone(&store), Ranker::from_settings(settings)?)
            .with_tree_builder(TopicTreeBuilder::new(TreeOptions::from(&settings.tree)))
            .with_followup_options(FollowupOptions::from(&settings.followups));
        engine.preview_chunks = settings.ranking.preview_chunks;
        engine.max_chunks_per_doc = settings.summary.max_chunks_per_doc;

        match get_default_embedder(&settings.embedding, store.dim()) {
            Ok(embedder) => engine.embedder = Some(embedder),
            Err(e) => warn!(error = %e, "no query embedder; text search disabled"),
        }
        if settings.summary.enabled {
            match OpenAiSummarizer::from_settings(&settings.summary) {
                Ok(s) => engine.summarizer = Some(Box::new(s)),
                Err(e) => warn!(error = %e, "no summarizer; falling back to plain result counts"),
            }
        }
        Ok(engine)
    }

    pub fn store(&self) -> &VectorStore { &self.store }
    pub fn ranker(&self) -> &Ranker { &self.ranker }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = self.embedder.as_ref().ok_or_else(|| Error::Unavailable("no query embedder configured".into()))?;
        embedder.embed(text).map_err(|e| match e {
            Error::ExternalDependency(_) | Error::DimensionMismatch { .. } => e,
            other => Error::ExternalDependency(format!("query embedding failed: {other}")),
        })
    }

    /// Rank an already embedded query.
    pub fn rank_vector(&self, query: &[f32], role: Role, top_docs: usize) -> Result<Vec<RankedDocument>> {
        self.ranker.rank_with(&self.store, query, role, top_docs, self.ranker.options().top_chunks)
    }

    /// Raw nearest chunks for a query, before any role weighting.
    pub fn chunks(&self, query: &str, k: usize) -> Result<Vec<ChunkMatch>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidRequest("query is required".into()));
        }
        let vector = self.embed_query(query.trim())?;
        Ok(self
            .store
            .top_k(&vector, k)?
            .into_iter()
            .filter_map(|(index, similarity)| {
                let c = self.store.chunk(index)?;
                Some(ChunkMatch {
                    index,
                    chunk_id: c.chunk_id.clone(),
                    doc_id: c.doc_id.clone(),
                    pmcid: c.pmcid.clone(),
                    section: c.section,
                    similarity,
                    preview: preview(&c.text, PREVIEW_CHARS),
                })
            })
            .collect())
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::InvalidRequest("query is required".into()));
        }
        let top_docs = request.top_docs.unwrap_or(self.ranker.options().top_docs);
        if top_docs == 0 {
            return Err(Error::InvalidRequest("top_docs must be positive".into()));
        }
        let role = Role::from_alias(&request.role);
        info!(query, role = %role, top_docs, "search");

        let vector = self.embed_query(query)?;
        let ranked = self.rank_vector(&vector, role, top_docs)?;

        let mut history: Vec<ChatTurn> = request.history.iter().filter(|t| t.role == "user").cloned().collect();
        if ranked.is_empty() {
            history.push(ChatTurn::assistant(NO_RESULTS_SUMMARY));
            return Ok(SearchResponse {
                results: Vec::new(),
                summary: NO_RESULTS_SUMMARY.to_string(),
                count: 0,
                query: query.to_string(),
                role,
                history,
            });
        }

        let results: Vec<SearchResult> = ranked.iter().map(|doc| self.result_for(doc)).collect();
        let summary = self.summarize(role, query, &ranked, &request.history);
        history.push(ChatTurn::assistant(summary.clone()));

        Ok(SearchResponse { count: results.len(), results, summary, query: query.to_string(), role, history })
    }

    fn result_for(&self, doc: &RankedDocument) -> SearchResult {
        let top_chunks = doc
            .top_chunks(self.preview_chunks)
            .into_iter()
            .filter_map(|hit| {
                let chunk = self.store.chunk(hit.index)?;
                Some(ChunkPreview { text: preview(&chunk.text, PREVIEW_CHARS), section: hit.section, similarity: hit.similarity })
            })
            .collect();
        SearchResult {
            id: doc.doc_id.clone(),
            title: doc.title.clone(),
            pmcid: doc.pmcid.clone(),
            url: doc.url.clone(),
            score: doc.score,
            chunk_count: doc.chunks.len(),
            top_chunks,
        }
    }

    /// Excerpt bundles for the summarizer: each document's most similar chunks.
    pub fn digests(&self, ranked: &[RankedDocument]) -> Vec<DocumentDigest> {
        ranked
            .iter()
            .map(|doc| DocumentDigest {
                title: doc.title.clone(),
                pmcid: doc.pmcid.clone(),
                url: doc.url.clone(),
                score: doc.score,
                excerpts: doc
                    .top_chunks(self.max_chunks_per_doc)
                    .into_iter()
                    .filter_map(|hit| self.store.chunk(hit.index).map(|c| (hit.section, c.text.clone())))
                    .collect(),
            })
            .collect()
    }

    fn summarize(&self, role: Role, query: &str, ranked: &[RankedDocument], history: &[ChatTurn]) -> String {
        let Some(summarizer) = &self.summarizer else {
            return fallback_summary(ranked.len());
        };
        match summarizer.summarize(role, query, &self.digests(ranked), history) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "summary generation failed");
                fallback_summary(ranked.len())
            }
        }
    }

    pub fn topic_tree(&self) -> Arc<TopicTree> { self.tree.get_or_build(&self.store) }

    pub fn invalidate_tree(&self) { self.tree.invalidate(); }

    /// The first `limit` distinct documents among the first chunks of the corpus.
    pub fn trending(&self, limit: usize) -> Vec<TrendingItem> {
        let mut seen = std::collections::HashSet::new();
        self.store
            .chunks()
            .iter()
            .take(TRENDING_SCAN_CHUNKS)
            .filter(|c| seen.insert(c.doc_id.as_str()))
            .take(limit)
            .map(|c| TrendingItem {
                id: c.doc_id.clone(),
                title: c.title.clone(),
                pmcid: c.pmcid.clone(),
                url: c.url.clone(),
                section: c.section,
                preview: preview(&c.text, TRENDING_PREVIEW_CHARS),
            })
            .collect()
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            chunks_loaded: self.store.len(),
            dim: self.store.dim(),
            documents: self.store.document_count(),
            embedder: self.embedder.as_ref().map(|e| e.id().to_string()),
            summarizer: self.summarizer.is_some(),
            tree_cached: self.tree.is_cached(),
        }
    }

    pub fn future_work(&self, pmcid: &str) -> Result<Vec<FutureWorkItem>> {
        if !self.store.chunks().iter().any(|c| c.pmcid == pmcid) {
            return Err(Error::NotFound(format!("no paper with pmcid '{pmcid}'")));
        }
        Ok(extract_future_work(&self.store, pmcid, future_work::DEFAULT_MAX_ITEMS))
    }

    /// Papers, other than `source_pmcid`, that look like follow-ups to `intent_text`.
    pub fn followups(&self, intent_text: &str, source_pmcid: &str) -> Result<Vec<Followup>> {
        if intent_text.trim().is_empty() {
            return Err(Error::InvalidRequest("intent text is required".into()));
        }
        let vector = self.embed_query(intent_text)?;
        find_followups(&self.store, &vector, source_pmcid, self.followups)
    }
}
