use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use skynet_core::corpus::{load_corpus, Corpus};
use skynet_core::{Chunk, Error, Result};

use crate::search::{dot, normalized, top_k_indices};

/// Immutable chunk store. Safe to share across threads behind an `Arc`.
#[derive(Debug)]
pub struct VectorStore {
    chunks: Vec<Chunk>,
    dim: usize,
    raw: Vec<f32>,
    unit: Vec<f32>,
    /// doc_id -> chunk indices, in order of first appearance.
    documents: Vec<(String, Vec<usize>)>,
    fingerprint: String,
}

impl VectorStore {
    pub fn from_corpus(corpus: Corpus) -> Self {
        let (chunks, dim, raw) = corpus.into_parts();
        let mut unit = Vec::with_capacity(raw.len());
        if dim > 0 {
            for row in raw.chunks_exact(dim) { unit.extend(normalized(row)); }
        }

        let mut documents: Vec<(String, Vec<usize>)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let pos = *positions.entry(chunk.doc_id.as_str()).or_insert_with(|| {
                documents.push((chunk.doc_id.clone(), Vec::new()));
                documents.len() - 1
            });
            documents[pos].1.push(i);
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(dim as u64).to_le_bytes());
        for chunk in &chunks {
            hasher.update(chunk.chunk_id.as_bytes());
            hasher.update(&[0]);
        }
        let fingerprint = hasher.finalize().to_hex().to_string();

        Self { chunks, dim, raw, unit, documents, fingerprint }
    }

    /// Load `.npy` + `_chunks.jsonl`, optionally pinning the expected dimension.
    pub fn load(embeddings_path: &Path, metadata_path: &Path, expected_dim: Option<usize>) -> Result<Self> {
        let corpus = load_corpus(embeddings_path, metadata_path)?;
        if let Some(d) = expected_dim { corpus.expect_dim(d)?; }
        let store = Self::from_corpus(corpus);
        info!(chunks = store.len(), documents = store.document_count(), dim = store.dim, "vector store ready");
        Ok(store)
    }

    pub fn empty(dim: usize) -> Self { Self::from_corpus(Corpus::empty(dim)) }

    pub fn len(&self) -> usize { self.chunks.len() }
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
    pub fn dim(&self) -> usize { self.dim }
    pub fn chunks(&self) -> &[Chunk] { &self.chunks }
    pub fn chunk(&self, index: usize) -> Option<&Chunk> { self.chunks.get(index) }

    /// Stored embedding of chunk `index`, as loaded.
    pub fn raw_row(&self, index: usize) -> &[f32] { &self.raw[index * self.dim..(index + 1) * self.dim] }

    pub fn document_count(&self) -> usize { self.documents.len() }

    /// Every document with its chunk indices, in order of first appearance.
    pub fn document_groups(&self) -> &[(String, Vec<usize>)] { &self.documents }

    /// Identifies this snapshot: changes whenever the chunk list or dimension does.
    pub fn fingerprint(&self) -> &str { &self.fingerprint }

    pub fn check_dim(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, found: query.len() });
        }
        Ok(())
    }

    /// Cosine similarity of `query` to every chunk, by chunk index.
    pub fn similarities(&self, query: &[f32]) -> Result<Vec<f32>> {
        self.check_dim(query)?;
        if self.is_empty() { return Ok(Vec::new()); }
        let q = normalized(query);
        Ok(self.unit.chunks_exact(self.dim).map(|row| dot(&q, row)).collect())
    }

    /// The `k` most similar chunks as `(index, similarity)`, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let sims = self.similarities(query)?;
        Ok(top_k_indices(&sims, k).into_iter().map(|i| (i, sims[i])).collect())
    }

    /// Unweighted mean of the raw embeddings of the given chunks.
    pub fn mean_vector(&self, indices: &[usize]) -> Vec<f32> {
        let mut mean = vec![0f32; self.dim];
        if indices.is_empty() { return mean; }
        for &i in indices {
            for (m, v) in mean.iter_mut().zip(self.raw_row(i)) { *m += v; }
        }
        let n = indices.len() as f32;
        for m in &mut mean { *m /= n; }
        mean
    }
}
