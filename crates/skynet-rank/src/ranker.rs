use std::collections::HashMap;
use tracing::debug;

use skynet_core::config::Settings;
use skynet_core::{ChunkHit, RankedDocument, Result, Role, RoleWeights};
use skynet_vector::VectorStore;

use crate::boost::FeatureBoost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankerOptions {
    pub top_docs: usize,
    pub top_chunks: usize,
}

impl Default for RankerOptions {
    fn default() -> Self { Self { top_docs: 5, top_chunks: 50 } }
}

/// Scores documents for a query vector and a role.
///
/// A chunk among the `top_chunks` most similar contributes
/// `(1 + weight(role, section)) * similarity * (1 + boost(role, text))`
/// to its document. Documents are ordered by the sum of their contributions;
/// ties keep the order in which the documents were first reached.
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    weights: RoleWeights,
    boost: FeatureBoost,
    options: RankerOptions,
}

impl Ranker {
    pub fn new(weights: RoleWeights, boost: FeatureBoost, options: RankerOptions) -> Self { Self { weights, boost, options } }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            settings.role_weights()?,
            FeatureBoost::from_settings(&settings.boost)?,
            RankerOptions { top_docs: settings.ranking.top_docs, top_chunks: settings.ranking.top_chunks },
        ))
    }

    pub fn options(&self) -> RankerOptions { self.options }
    pub fn weights(&self) -> &RoleWeights { &self.weights }

    /// Rank with the configured `top_docs` / `top_chunks`.
    pub fn rank(&self, store: &VectorStore, query: &[f32], role: Role) -> Result<Vec<RankedDocument>> {
        self.rank_with(store, query, role, self.options.top_docs, self.options.top_chunks)
    }

    pub fn rank_with(
        &self,
        store: &VectorStore,
        query: &[f32],
        role: Role,
        top_docs: usize,
        top_chunks: usize,
    ) -> Result<Vec<RankedDocument>> {
        if store.is_empty() {
            return Ok(Vec::new());
        }
        let top = store.top_k(query, top_chunks)?;

        let mut docs: Vec<RankedDocument> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (index, similarity) in top {
            let Some(chunk) = store.chunk(index) else { continue };
            let weight = self.weights.weight(role, chunk.section);
            let boost = self.boost.boost(role, &chunk.text);
            let contribution = (1.0 + weight) * similarity * (1.0 + boost);

            let pos = *positions.entry(chunk.doc_id.as_str()).or_insert_with(|| {
                docs.push(RankedDocument {
                    doc_id: chunk.doc_id.clone(),
                    score: 0.0,
                    chunks: Vec::new(),
                    title: chunk.title.clone(),
                    pmcid: chunk.pmcid.clone(),
                    url: chunk.url.clone(),
                });
                docs.len() - 1
            });
            let doc = &mut docs[pos];
            doc.score += contribution;
            doc.chunks.push(ChunkHit { index, similarity, section: chunk.section, weight, boost, contribution });
        }

        docs.sort_by(|a, b| b.score.total_cmp(&a.score));
        docs.truncate(top_docs);
        debug!(role = %role, top_chunks, documents = docs.len(), "ranked query");
        Ok(docs)
    }
}
