use std::collections::{BTreeMap, HashSet};

pub const FALLBACK_LABEL: &str = "Miscellaneous";

/// Term counts for one cluster of documents.
#[derive(Debug, Clone, Default)]
pub struct TermCounts {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl TermCounts {
    pub fn add<'a>(&mut self, terms: impl IntoIterator<Item = &'a String>) {
        for term in terms {
            *self.counts.entry(term.clone()).or_insert(0) += 1;
            self.total += 1;
        }
    }

    pub fn is_empty(&self) -> bool { self.total == 0 }
}

/// For each sibling cluster, its `n` highest TF-IDF terms. Each cluster is one
/// "document" for IDF purposes, so terms shared by every sibling sink.
/// Ties go to the lexically smaller term.
pub fn distinguishing_terms(clusters: &[TermCounts], n: usize) -> Vec<Vec<String>> {
    let total_clusters = clusters.len() as f64;
    let mut df: BTreeMap<&str, usize> = BTreeMap::new();
    for cluster in clusters {
        let seen: HashSet<&str> = cluster.counts.keys().map(String::as_str).collect();
        for term in seen {
            *df.entry(term).or_insert(0) += 1;
        }
    }

    clusters
        .iter()
        .map(|cluster| {
            if cluster.is_empty() {
                return Vec::new();
            }
            let mut scored: Vec<(&str, f64)> = cluster
                .counts
                .iter()
                .map(|(term, &count)| {
                    let tf = count as f64 / cluster.total as f64;
                    let idf = ((1.0 + total_clusters) / (1.0 + df[term.as_str()] as f64)).ln() + 1.0;
                    (term.as_str(), tf * idf)
                })
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            scored.into_iter().take(n).map(|(t, _)| t.to_string()).collect()
        })
        .collect()
}

pub fn label_from(terms: &[String]) -> String {
    if terms.is_empty() { FALLBACK_LABEL.to_string() } else { terms.join(", ") }
}
