use serde::{Deserialize, Serialize};
use std::time::Duration;

use skynet_core::config::EmbeddingSettings;
use skynet_core::traits::Embedder;
use skynet_core::{Error, Result};

use crate::http::{api_key_from_env, ApiClient};

const BATCH_SIZE: usize = 32;

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    api: ApiClient,
    model: String,
    dim: usize,
    id: String,
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct Response {
    data: Vec<ResponseItem>,
}

#[derive(Deserialize)]
struct ResponseItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Reads the API key from the environment variable named in `settings`.
    pub fn from_settings(settings: &EmbeddingSettings, dim: usize) -> Result<Self> {
        let api_key = api_key_from_env(&settings.api_key_env)?;
        Self::new(&settings.base_url, &api_key, &settings.model, dim, Duration::from_secs(settings.timeout_secs), settings.max_retries)
    }

    pub fn new(base_url: &str, api_key: &str, model: &str, dim: usize, timeout: Duration, max_retries: u32) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, api_key, timeout, max_retries)?,
            model: model.to_string(),
            dim,
            id: format!("openai:{model}"),
        })
    }

    fn collect(&self, mut parsed: Response, expected: usize) -> Result<Vec<Vec<f32>>> {
        if parsed.data.len() != expected {
            return Err(Error::ExternalDependency(format!("expected {expected} embeddings, got {}", parsed.data.len())));
        }
        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, found: v.len() });
        }
        Ok(vectors)
    }
}

impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let parsed: Response = self.api.post("/embeddings", &Request { model: &self.model, input: batch })?;
            out.extend(self.collect(parsed, batch.len())?);
        }
        Ok(out)
    }
}
