use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use skynet_core::config::Config;
use skynet_core::corpus::{metadata_path_for, write_metadata, write_npy, Corpus};
use skynet_core::traits::{ChatTurn, DocumentDigest, Embedder, Summarizer};
use skynet_core::{Chunk, ChunkRecord, Error, Result, Role};
use skynet_embed::FakeEmbedder;
use skynet_engine::{KnowledgeEngine, SearchRequest, NO_RESULTS_SUMMARY};
use skynet_rank::Ranker;
use skynet_vector::VectorStore;

const DIM: usize = 32;

fn record(i: usize, pmcid: &str, section: &str, text: &str) -> ChunkRecord {
    ChunkRecord {
        chunk_id: format!("chunk_{i:06}"),
        doc_id: format!("doc_{pmcid}"),
        pmcid: pmcid.to_string(),
        section: section.to_string(),
        chunk_text: text.to_string(),
        title: format!("Paper {pmcid}"),
        url: format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/"),
        extra: Default::default(),
    }
}

fn records() -> Vec<ChunkRecord> {
    let long = "bone loss microgravity ".repeat(12);
    vec![
        record(0, "PMC1", "abstract", "bone loss in microgravity"),
        record(1, "PMC1", "methods", "mice bone density scans"),
        record(2, "PMC1", "results", &long),
        record(3, "PMC1", "discussion", "Further studies are needed to assess bone recovery after flight."),
        record(4, "PMC2", "abstract", "plant roots grow in microgravity"),
        record(5, "PMC2", "funding", "funded by NASA grant"),
        record(6, "PMC3", "abstract", "bone loss countermeasures exercise"),
    ]
}

fn store() -> Arc<VectorStore> {
    let records = records();
    let texts: Vec<String> = records.iter().map(|r| r.chunk_text.clone()).collect();
    let rows = FakeEmbedder::new(DIM).embed_batch(&texts).unwrap();
    let chunks = records.into_iter().map(|r| Chunk::from_record(r).unwrap()).collect();
    Arc::new(VectorStore::from_corpus(Corpus::from_rows(chunks, rows).unwrap()))
}

#[derive(Default)]
struct RecordingSummarizer {
    calls: Mutex<Vec<(Role, usize, usize)>>,
}

impl Summarizer for RecordingSummarizer {
    fn summarize(&self, role: Role, _query: &str, digests: &[DocumentDigest], history: &[ChatTurn]) -> Result<String> {
        self.calls.lock().unwrap().push((role, digests.len(), history.len()));
        assert!(digests.iter().all(|d| !d.excerpts.is_empty() && d.excerpts.len() <= 3));
        Ok(format!("summary of {} papers", digests.len()))
    }
}

struct FailingSummarizer;

impl Summarizer for FailingSummarizer {
    fn summarize(&self, _: Role, _: &str, _: &[DocumentDigest], _: &[ChatTurn]) -> Result<String> {
        Err(Error::ExternalDependency("model unavailable".into()))
    }
}

fn engine() -> KnowledgeEngine {
    KnowledgeEngine::new(store(), Ranker::default()).with_embedder(Box::new(FakeEmbedder::new(DIM)))
}

#[test]
fn search_ranks_summarizes_and_records_history() {
    let engine = engine().with_summarizer(Box::new(RecordingSummarizer::default()));
    let mut request = SearchRequest::new("bone loss microgravity", "Researcher/Scientist");
    request.history = vec![ChatTurn::user("what about bones"), ChatTurn::assistant("earlier answer")];

    let response = engine.search(&request).expect("search");
    assert_eq!(response.role, Role::Researcher);
    assert!(response.count > 0 && response.count <= 5);
    assert_eq!(response.results[0].id, "doc_PMC1");
    assert_eq!(response.summary, format!("summary of {} papers", response.count));

    let top = &response.results[0];
    assert!(top.top_chunks.len() <= 3 && !top.top_chunks.is_empty());
    for pair in top.top_chunks.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    assert!(top.top_chunks.iter().all(|p| p.text.chars().count() <= 203));

    let roles: Vec<&str> = response.history.iter().map(|t| t.role.as_str()).collect();
    assert_eq!(roles, vec!["user", "assistant"]);
    assert_eq!(response.history[1].content, response.summary);
}

#[test]
fn failing_or_missing_summarizer_falls_back_to_count() {
    let engine = engine().with_summarizer(Box::new(FailingSummarizer));
    let response = engine.search(&SearchRequest::new("bone loss", "student")).expect("degraded, not failed");
    assert_eq!(response.summary, format!("Found {} relevant documents for your query.", response.count));

    let plain = self::engine().search(&SearchRequest::new("bone loss", "")).unwrap();
    assert!(plain.summary.starts_with("Found "));
}

#[test]
fn chunks_lists_nearest_passages() {
    let engine = engine();
    let hits = engine.chunks("bone loss in microgravity", 3).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk_id, "chunk_000000");
    assert!((hits[0].similarity - 1.0).abs() < 1e-5);
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    assert_eq!(engine.chunks("bone", 50).unwrap().len(), 7);
}

#[test]
fn empty_query_is_rejected() {
    let err = engine().search(&SearchRequest::new("   ", "Researcher")).unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
}

#[test]
fn missing_embedder_is_unavailable_but_vector_ranking_works() {
    let engine = KnowledgeEngine::new(store(), Ranker::default());
    let err = engine.search(&SearchRequest::new("bone", "Researcher")).unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)), "got {err:?}");

    let q = FakeEmbedder::new(DIM).embed("plant roots").unwrap();
    let ranked = engine.rank_vector(&q, Role::Student, 2).unwrap();
    assert_eq!(ranked[0].pmcid, "PMC2");
    assert!(ranked.len() <= 2);
}

#[test]
fn empty_store_answers_with_no_results() {
    let engine = KnowledgeEngine::new(Arc::new(VectorStore::empty(DIM)), Ranker::default())
        .with_embedder(Box::new(FakeEmbedder::new(DIM)))
        .with_summarizer(Box::new(FailingSummarizer));
    let response = engine.search(&SearchRequest::new("anything", "Funding Manager")).unwrap();
    assert_eq!(response.count, 0);
    assert!(response.results.is_empty());
    assert_eq!(response.summary, NO_RESULTS_SUMMARY);
    assert_eq!(response.role, Role::FundingManager);
}

#[test]
fn trending_lists_distinct_documents_with_previews() {
    let items = engine().trending(8);
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["doc_PMC1", "doc_PMC2", "doc_PMC3"]);
    assert_eq!(engine().trending(2).len(), 2);
}

#[test]
fn health_reports_store_shape() {
    let engine = engine();
    let health = engine.health();
    assert_eq!(health.chunks_loaded, 7);
    assert_eq!(health.dim, DIM);
    assert_eq!(health.documents, 3);
    assert_eq!(health.embedder.as_deref(), Some("fake:xxhash:d32"));
    assert!(!health.summarizer);
    assert!(!health.tree_cached);

    let tree = engine.topic_tree();
    assert_eq!(tree.root.size, 3);
    assert!(engine.health().tree_cached);
    engine.invalidate_tree();
    assert!(!engine.health().tree_cached);
}

#[test]
fn future_work_and_followups_through_engine() {
    let engine = engine();
    let items = engine.future_work("PMC1").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "Further studies are needed to assess bone recovery after flight.");
    assert!(engine.future_work("PMC2").unwrap().is_empty());
    assert!(matches!(engine.future_work("PMC404"), Err(Error::NotFound(_))));

    let followups = engine.followups("bone loss countermeasures", "PMC1").unwrap();
    assert!(followups.iter().all(|f| f.paper_id != "PMC1"));
    assert_eq!(followups.first().map(|f| f.paper_id.as_str()), Some("PMC3"));
}

#[test]
fn engine_from_config_directory() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    let emb = tmp.path().join("data/emb.npy");

    let recs = records();
    let texts: Vec<String> = recs.iter().map(|r| r.chunk_text.clone()).collect();
    let rows = FakeEmbedder::new(DIM).embed_batch(&texts).unwrap();
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    write_npy(&emb, recs.len(), DIM, &flat).unwrap();
    write_metadata(&metadata_path_for(&emb), &recs).unwrap();

    fs::write(
        tmp.path().join("config.toml"),
        "[corpus]\nembeddings_path = \"data/emb.npy\"\n\n[embedding]\nprovider = \"fake\"\n\n[summary]\nenabled = false\n\n[ranking]\ntop_docs = 2\n",
    )
    .unwrap();

    let config = Config::load_from(tmp.path()).expect("config");
    let engine = KnowledgeEngine::from_config(&config).expect("engine");
    assert_eq!(engine.health().chunks_loaded, 7);
    let response = engine.search(&SearchRequest::new("bone loss", "Researcher")).unwrap();
    assert!(response.count <= 2);
}
