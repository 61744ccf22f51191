use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use skynet_core::Section;
use skynet_vector::VectorStore;

pub const DEFAULT_MAX_ITEMS: usize = 12;
const MAX_LABEL_CHARS: usize = 180;

static HINTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:future work|further (?:study|studies|research)|remains (?:unclear|unknown)|should (?:assess|evaluate|examine|investigate)|needed (?:to|for)|warrant(?:ed)?|longitudinal|long-term|next steps|in the future)\b",
    )
    .expect("future-work hint pattern compiles")
});

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence pattern compiles"));

const SECTION_LABELS: [&str; 5] = ["discussion", "conclusion", "future work", "limitations", "outlook"];
const CONFIDENCE_CUES: [&str; 5] = ["assess", "investigate", "evaluate", "unknown", "longitudinal"];

/// A sentence flagged as an open research direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FutureWorkItem {
    pub intent_id: String,
    pub label: String,
    pub score: f32,
    pub raw_sentence: String,
    pub section: String,
    pub chunk_index: usize,
}

pub fn has_hint(text: &str) -> bool { HINTS.is_match(text) }

fn in_allowed_section(section_label: &str, section: Section) -> bool {
    SECTION_LABELS.contains(&section_label) || matches!(section, Section::Discussion | Section::Conclusion)
}

/// Split after `.`, `!` or `?` followed by whitespace; punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        out.push(&text[start..=m.start()]);
        start = m.end();
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn normalize(sentence: &str) -> String {
    let collapsed = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_LABEL_CHARS).collect()
}

fn confidence(label: &str) -> f32 {
    let lower = label.to_lowercase();
    let cues = CONFIDENCE_CUES.iter().filter(|cue| lower.contains(*cue)).count();
    let score = (0.5 + 0.1 * cues as f32).min(0.95);
    (score * 100.0).round() / 100.0
}

fn intent_id(pmcid: &str, key: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(pmcid.as_bytes());
    hasher.update(&[0]);
    hasher.update(key.as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("fw_{}", &hex.as_str()[..8])
}

/// Future-work sentences from the closing sections of one paper, in corpus
/// order, deduplicated case-insensitively, at most `max_items`.
pub fn extract_future_work(store: &VectorStore, pmcid: &str, max_items: usize) -> Vec<FutureWorkItem> {
    let mut items = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, chunk) in store.chunks().iter().enumerate() {
        if chunk.pmcid != pmcid || !in_allowed_section(&chunk.section_label, chunk.section) || !has_hint(&chunk.text) {
            continue;
        }
        for sentence in split_sentences(&chunk.text) {
            if items.len() >= max_items {
                return items;
            }
            if !has_hint(sentence) {
                continue;
            }
            let label = normalize(sentence);
            let key = label.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }
            items.push(FutureWorkItem {
                intent_id: intent_id(pmcid, &key),
                score: confidence(&label),
                label,
                raw_sentence: sentence.to_string(),
                section: chunk.section_label.clone(),
                chunk_index: index,
            });
        }
    }
    items
}
