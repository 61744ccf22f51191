use proptest::prelude::*;
use std::collections::HashMap;

use skynet_core::corpus::Corpus;
use skynet_core::{Chunk, ChunkRecord, Error, Role, RoleWeights, Section};
use skynet_rank::{FeatureBoost, Ranker, RankerOptions};
use skynet_vector::VectorStore;

const SECTIONS: [&str; 6] = ["abstract", "methods", "results", "funding", "conclusion", "introduction"];

fn chunk(i: usize, doc: &str, section: &str, text: &str) -> Chunk {
    Chunk::from_record(ChunkRecord {
        chunk_id: format!("chunk_{i:06}"),
        doc_id: doc.to_string(),
        pmcid: doc.to_string(),
        section: section.to_string(),
        chunk_text: text.to_string(),
        title: format!("Title of {doc}"),
        url: String::new(),
        extra: Default::default(),
    })
    .expect("valid record")
}

fn store_from(chunks: Vec<Chunk>, rows: Vec<Vec<f32>>) -> VectorStore {
    VectorStore::from_corpus(Corpus::from_rows(chunks, rows).expect("valid corpus"))
}

#[test]
fn methods_chunk_for_researcher_scores_1_26() {
    // Query [1, 0]; each row is a unit vector whose first component is its similarity.
    let chunks = vec![
        chunk(0, "doc_A", "methods", "plain words"),
        chunk(1, "doc_A", "introduction", "plain words"),
        chunk(2, "doc_B", "results", "plain words"),
        chunk(3, "doc_B", "abstract", "plain words"),
        chunk(4, "doc_C", "funding", "plain words"),
        chunk(5, "doc_C", "introduction", "plain words"),
    ];
    let rows = vec![
        vec![0.9, 0.435_889_9],
        vec![0.1, 0.994_987_4],
        vec![0.6, 0.8],
        vec![0.3, 0.953_939_2],
        vec![0.2, 0.979_795_9],
        vec![0.05, 0.998_749_2],
    ];
    let store = store_from(chunks, rows);
    let ranker = Ranker::new(RoleWeights::default(), FeatureBoost::none(), RankerOptions::default());

    let docs = ranker.rank(&store, &[1.0, 0.0], Role::Researcher).unwrap();
    let order: Vec<&str> = docs.iter().map(|d| d.doc_id.as_str()).collect();
    assert_eq!(order, vec!["doc_A", "doc_B", "doc_C"]);

    let hit = docs[0].chunks[0];
    assert_eq!(hit.section, Section::Methods);
    assert!((hit.similarity - 0.9).abs() < 1e-4, "similarity {}", hit.similarity);
    assert!((hit.weight - 0.4).abs() < 1e-6);
    assert!((hit.contribution - 1.26).abs() < 1e-3, "contribution {}", hit.contribution);

    // 1.26 + 0.1 (unweighted introduction), 1.35 * 0.6 + 1.15 * 0.3, 1.03 * 0.2 + 0.05
    for (doc, expected) in docs.iter().zip([1.36f32, 1.155, 0.256]) {
        assert_eq!(doc.chunks.len(), 2);
        assert!((doc.score - expected).abs() < 1e-3, "{} scored {}", doc.doc_id, doc.score);
    }
}

#[test]
fn weight_scales_negative_similarity_away_from_zero() {
    let store = store_from(vec![chunk(0, "doc_A", "methods", "plain words")], vec![vec![-1.0, 0.0]]);
    let mut full = RoleWeights::empty();
    full.set(Role::Researcher, Section::Methods, 1.0).unwrap();

    let unweighted = Ranker::new(RoleWeights::empty(), FeatureBoost::none(), RankerOptions::default());
    let weighted = Ranker::new(full, FeatureBoost::none(), RankerOptions::default());
    let a = unweighted.rank(&store, &[1.0, 0.0], Role::Researcher).unwrap()[0].score;
    let b = weighted.rank(&store, &[1.0, 0.0], Role::Researcher).unwrap()[0].score;
    assert!((a + 1.0).abs() < 1e-5, "score {a}");
    assert!((b + 2.0).abs() < 1e-5, "score {b}");
}

#[test]
fn weighted_section_lifts_document_for_role() {
    let chunks = vec![chunk(0, "doc_funding", "funding", "plain words"), chunk(1, "doc_results", "results", "plain words")];
    let rows = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
    let store = store_from(chunks, rows);
    let ranker = Ranker::new(RoleWeights::default(), FeatureBoost::none(), RankerOptions::default());

    let manager = ranker.rank(&store, &[1.0, 0.0], Role::FundingManager).unwrap();
    assert_eq!(manager[0].doc_id, "doc_funding");
    let researcher = ranker.rank(&store, &[1.0, 0.0], Role::Researcher).unwrap();
    assert_eq!(researcher[0].doc_id, "doc_results");
}

#[test]
fn query_dimension_must_match_store() {
    let rows = (0..3).map(|i| vec![i as f32 + 1.0; 8]).collect();
    let chunks = (0..3).map(|i| chunk(i, "doc_A", "abstract", "x")).collect();
    let store = store_from(chunks, rows);
    let err = Ranker::default().rank(&store, &[0.1; 5], Role::Student).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 8, found: 5 }), "got {err:?}");
}

#[test]
fn empty_store_yields_no_documents() {
    let store = VectorStore::empty(8);
    assert!(Ranker::default().rank(&store, &[0.1; 8], Role::Researcher).unwrap().is_empty());
    assert!(Ranker::default().rank(&store, &[0.1; 3], Role::Researcher).unwrap().is_empty());
}

fn arb_corpus() -> impl Strategy<Value = (Vec<Chunk>, Vec<Vec<f32>>)> {
    prop::collection::vec((0usize..6, 0usize..SECTIONS.len(), prop::collection::vec(0.0f32..1.0, 4), 0usize..4), 1..40)
        .prop_map(|items| {
            let mut chunks = Vec::new();
            let mut rows = Vec::new();
            for (i, (doc, section, row, grants)) in items.into_iter().enumerate() {
                let text = "grant ".repeat(grants);
                chunks.push(chunk(i, &format!("doc_{doc}"), SECTIONS[section], &text));
                rows.push(row);
            }
            (chunks, rows)
        })
}

fn scores(docs: &[skynet_core::RankedDocument]) -> HashMap<String, f32> {
    docs.iter().map(|d| (d.doc_id.clone(), d.score)).collect()
}

proptest! {
    #[test]
    fn rank_is_bounded_and_documents_have_chunks(
        (chunks, rows) in arb_corpus(),
        query in prop::collection::vec(-1.0f32..1.0, 4),
        top_docs in 1usize..8,
        top_chunks in 1usize..60,
    ) {
        let store = store_from(chunks, rows);
        let ranker = Ranker::default();
        for role in Role::ALL {
            let docs = ranker.rank_with(&store, &query, role, top_docs, top_chunks).unwrap();
            prop_assert!(docs.len() <= top_docs);
            for doc in &docs {
                prop_assert!(!doc.chunks.is_empty());
                let sum: f32 = doc.chunks.iter().map(|c| c.contribution).sum();
                prop_assert!((sum - doc.score).abs() < 1e-4);
            }
            for pair in docs.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[test]
    fn rank_is_deterministic((chunks, rows) in arb_corpus(), query in prop::collection::vec(-1.0f32..1.0, 4)) {
        let store = store_from(chunks, rows);
        let ranker = Ranker::default();
        let a = ranker.rank(&store, &query, Role::FundingManager).unwrap();
        let b = ranker.rank(&store, &query, Role::FundingManager).unwrap();
        prop_assert_eq!(a, b);
    }

    // Holds for non-negative similarities only; see weight_scales_negative_similarity_away_from_zero.
    #[test]
    fn raising_a_section_weight_never_lowers_scores(
        (chunks, rows) in arb_corpus(),
        query in prop::collection::vec(0.0f32..1.0, 4),
        low in 0.0f32..0.5,
        delta in 0.0f32..0.5,
    ) {
        let store = store_from(chunks, rows);
        let mut before = RoleWeights::default();
        before.set(Role::Researcher, Section::Methods, low).unwrap();
        let mut after = RoleWeights::default();
        after.set(Role::Researcher, Section::Methods, low + delta).unwrap();

        let opts = RankerOptions::default();
        let r1 = Ranker::new(before, FeatureBoost::default(), opts).rank_with(&store, &query, Role::Researcher, usize::MAX, 50).unwrap();
        let r2 = Ranker::new(after, FeatureBoost::default(), opts).rank_with(&store, &query, Role::Researcher, usize::MAX, 50).unwrap();
        let (s1, s2) = (scores(&r1), scores(&r2));
        for (doc, score) in &s1 {
            prop_assert!(s2[doc] >= score - 1e-5, "{} dropped from {} to {}", doc, score, s2[doc]);
        }
    }

    #[test]
    fn boost_is_non_negative_and_monotone(extra in 0usize..8, base in 0usize..4) {
        let boost = FeatureBoost::default();
        let few = "funding ".repeat(base);
        let more = format!("{few}{}", "grant ".repeat(extra));
        for role in Role::ALL {
            let a = boost.boost(role, &few);
            prop_assert!(a >= 0.0);
            prop_assert!(boost.boost(role, &more) >= a);
        }
    }
}
