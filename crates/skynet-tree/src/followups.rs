use serde::Serialize;
use std::collections::HashMap;

use skynet_core::config::FollowupSettings;
use skynet_core::Result;
use skynet_vector::VectorStore;

const MAX_TITLE_CHARS: usize = 160;
const MAX_EVIDENCE_CHARS: usize = 180;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowupOptions {
    /// Minimum best-chunk similarity for a paper to qualify.
    pub threshold: f32,
    pub limit: usize,
}

impl Default for FollowupOptions {
    fn default() -> Self { Self::from(&FollowupSettings::default()) }
}

impl From<&FollowupSettings> for FollowupOptions {
    fn from(s: &FollowupSettings) -> Self { Self { threshold: s.threshold, limit: s.limit } }
}

/// A paper that appears to pick up a research direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Followup {
    pub paper_id: String,
    pub title: String,
    pub relevance: f32,
    pub evidence: String,
    pub link: String,
}

fn truncate_chars(s: &str, max: usize) -> String { s.chars().take(max).collect() }

/// Papers other than `exclude_pmcid` ranked by their single best chunk
/// similarity to `query`. Equal relevance keeps corpus order.
pub fn find_followups(store: &VectorStore, query: &[f32], exclude_pmcid: &str, options: FollowupOptions) -> Result<Vec<Followup>> {
    if store.is_empty() {
        return Ok(Vec::new());
    }
    let sims = store.similarities(query)?;

    let mut best: Vec<(usize, f32)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, chunk) in store.chunks().iter().enumerate() {
        if !exclude_pmcid.is_empty() && chunk.pmcid == exclude_pmcid {
            continue;
        }
        let key = if chunk.pmcid.is_empty() { chunk.doc_id.as_str() } else { chunk.pmcid.as_str() };
        let sim = sims[index];
        match positions.get(key) {
            Some(&pos) => {
                if sim > best[pos].1 {
                    best[pos] = (index, sim);
                }
            }
            None => {
                positions.insert(key, best.len());
                best.push((index, sim));
            }
        }
    }

    best.retain(|&(_, sim)| sim >= options.threshold);
    best.sort_by(|a, b| b.1.total_cmp(&a.1));
    best.truncate(options.limit);

    Ok(best
        .into_iter()
        .filter_map(|(index, sim)| {
            let chunk = store.chunk(index)?;
            Some(Followup {
                paper_id: if chunk.pmcid.is_empty() { chunk.doc_id.clone() } else { chunk.pmcid.clone() },
                title: truncate_chars(&chunk.title, MAX_TITLE_CHARS),
                relevance: (sim * 1000.0).round() / 1000.0,
                evidence: truncate_chars(&chunk.text, MAX_EVIDENCE_CHARS),
                link: chunk.url.clone(),
            })
        })
        .collect())
}
