//! skynet-embed
//!
//! Embedding providers behind `skynet_core::traits::Embedder`: a remote
//! OpenAI-compatible client and a deterministic hashing embedder for tests.
//! The retrying JSON client in [`http`] is shared with the summarizer.

mod fake;
pub mod http;
mod openai;

pub use fake::FakeEmbedder;
pub use http::{api_key_from_env, ApiClient};
pub use openai::OpenAiEmbedder;

use skynet_core::config::EmbeddingSettings;
use skynet_core::traits::Embedder;
use skynet_core::Result;
use tracing::info;

/// True when `APP_USE_FAKE_EMBEDDINGS` is `1` or `true`.
pub fn fake_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Pick the configured provider. `dim` is the corpus dimension the vectors must match.
pub fn get_default_embedder(settings: &EmbeddingSettings, dim: usize) -> Result<Box<dyn Embedder>> {
    if fake_requested() || settings.provider.eq_ignore_ascii_case("fake") {
        info!(dim, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(dim)));
    }
    Ok(Box::new(OpenAiEmbedder::from_settings(settings, dim)?))
}
