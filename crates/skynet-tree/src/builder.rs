use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use skynet_core::config::TreeSettings;
use skynet_core::{Section, TopicNode};
use skynet_vector::VectorStore;

use crate::kmeans::Kmeans;
use crate::labels::{distinguishing_terms, label_from, TermCounts};
use crate::tokenize::LabelAnalyzer;

pub const ROOT_ID: &str = "root";
pub const ROOT_LABEL: &str = "All papers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    /// Topic levels below the root before papers are attached.
    pub max_depth: usize,
    /// Groups of at most this many documents are not split further.
    pub min_leaf: usize,
    pub root_k: usize,
    pub inner_k: usize,
    pub seed: u64,
    pub max_iter: usize,
    pub label_terms: usize,
}

impl Default for TreeOptions {
    fn default() -> Self { Self::from(&TreeSettings::default()) }
}

impl From<&TreeSettings> for TreeOptions {
    fn from(s: &TreeSettings) -> Self {
        Self {
            max_depth: s.max_depth,
            min_leaf: s.min_leaf,
            root_k: s.root_k,
            inner_k: s.inner_k,
            seed: s.seed,
            max_iter: s.max_iter,
            label_terms: s.label_terms,
        }
    }
}

/// A built hierarchy together with the store snapshot it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct TopicTree {
    pub root: TopicNode,
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
}

struct DocEntry {
    doc_id: String,
    title: String,
    pmcid: String,
    url: String,
    vector: Vec<f32>,
    terms: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TopicTreeBuilder {
    options: TreeOptions,
}

impl TopicTreeBuilder {
    pub fn new(options: TreeOptions) -> Self { Self { options } }

    pub fn options(&self) -> &TreeOptions { &self.options }

    pub fn build(&self, store: &VectorStore) -> TopicTree {
        let started = Instant::now();
        let docs = collect_documents(store);
        let members: Vec<usize> = (0..docs.len()).collect();

        let mut root = TopicNode::topic(ROOT_ID, ROOT_LABEL, docs.len());
        if !docs.is_empty() {
            root.children = self.partition(&docs, &members, 0, "t");
        }

        info!(
            documents = docs.len(),
            nodes = root.node_count(),
            depth = root.depth(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "topic tree built"
        );
        TopicTree { root, fingerprint: store.fingerprint().to_string(), built_at: Utc::now() }
    }

    /// Children for a node holding `members`. Topic ids extend `prefix`.
    fn partition(&self, docs: &[DocEntry], members: &[usize], depth: usize, prefix: &str) -> Vec<TopicNode> {
        let o = &self.options;
        if depth >= o.max_depth || members.len() <= o.min_leaf {
            return papers(docs, members);
        }

        let default_k = if depth == 0 { o.root_k } else { o.inner_k };
        let k = default_k.min(members.len() / 8).max(2).min(members.len());
        let points: Vec<&[f32]> = members.iter().map(|&m| docs[m].vector.as_slice()).collect();
        let assignment = Kmeans::new(k).with_max_iter(o.max_iter).with_seed(o.seed + depth as u64).fit(&points);

        let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (&m, &c) in members.iter().zip(&assignment) {
            clusters[c].push(m);
        }
        clusters.retain(|c| !c.is_empty());
        if clusters.len() < 2 {
            debug!(depth, documents = members.len(), "clustering did not split; attaching papers");
            return papers(docs, members);
        }
        // Stable: equal sizes keep cluster order.
        clusters.sort_by(|a, b| b.len().cmp(&a.len()));

        let counts: Vec<TermCounts> = clusters
            .iter()
            .map(|cluster| {
                let mut c = TermCounts::default();
                for &m in cluster {
                    c.add(&docs[m].terms);
                }
                c
            })
            .collect();
        let terms = distinguishing_terms(&counts, o.label_terms);

        clusters
            .iter()
            .zip(&terms)
            .enumerate()
            .map(|(i, (cluster, terms))| {
                let id = if depth == 0 { format!("{prefix}{i}") } else { format!("{prefix}.{i}") };
                let mut node = TopicNode::topic(id.clone(), label_from(terms), cluster.len());
                node.children = self.partition(docs, cluster, depth + 1, &id);
                node
            })
            .collect()
    }
}

fn papers(docs: &[DocEntry], members: &[usize]) -> Vec<TopicNode> {
    members
        .iter()
        .map(|&m| {
            let d = &docs[m];
            TopicNode::paper(d.doc_id.clone(), d.title.clone(), d.pmcid.clone(), d.url.clone())
        })
        .collect()
}

/// One entry per document: mean vector plus label terms from its title and
/// abstract (all chunk text when it has no abstract).
fn collect_documents(store: &VectorStore) -> Vec<DocEntry> {
    let mut analyzer = LabelAnalyzer::new();
    store
        .document_groups()
        .iter()
        .map(|(doc_id, indices)| {
            let chunks: Vec<_> = indices.iter().filter_map(|&i| store.chunk(i)).collect();
            let first = chunks.first();
            let title = first.map(|c| c.title.clone()).filter(|t| !t.is_empty()).unwrap_or_else(|| doc_id.clone());

            let has_abstract = chunks.iter().any(|c| c.section == Section::Abstract);
            let mut text = title.clone();
            for c in chunks.iter().filter(|c| !has_abstract || c.section == Section::Abstract) {
                text.push(' ');
                text.push_str(&c.text);
            }

            DocEntry {
                doc_id: doc_id.clone(),
                pmcid: first.map(|c| c.pmcid.clone()).unwrap_or_default(),
                url: first.map(|c| c.url.clone()).unwrap_or_default(),
                title,
                vector: store.mean_vector(indices),
                terms: analyzer.terms(&text),
            }
        })
        .collect()
}
