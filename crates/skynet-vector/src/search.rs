//! Dense vector primitives and deterministic top-k selection.

use std::cmp::Ordering;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= f32::EPSILON { 0.0 } else { dot(a, b) / denom }
}

/// Copy of `v` scaled to unit length (zero vectors stay zero).
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm <= f32::EPSILON { vec![0.0; v.len()] } else { v.iter().map(|x| x / norm).collect() }
}

/// Descending by score, ascending by index on ties.
fn by_score_then_index(scores: &[f32]) -> impl Fn(&usize, &usize) -> Ordering + '_ {
    move |&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b))
}

/// Indices of the `k` highest scores, best first. Ties keep the lower index first.
pub fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let k = k.min(scores.len());
    if k == 0 { return Vec::new(); }
    let cmp = by_score_then_index(scores);
    let mut idx: Vec<usize> = (0..scores.len()).collect();
    if k < idx.len() {
        idx.select_nth_unstable_by(k - 1, &cmp);
        idx.truncate(k);
    }
    idx.sort_by(&cmp);
    idx
}
