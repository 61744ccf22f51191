use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Role, Section};

/// Produces query/passage embeddings. Implementations must return vectors of
/// `dim()` values for every input, matching the dimension of the stored corpus.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        out.pop().ok_or_else(|| crate::Error::ExternalDependency(format!("{} returned no embedding", self.id())))
    }
}

/// One prior message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self { Self { role: "user".into(), content: content.into() } }
    pub fn assistant(content: impl Into<String>) -> Self { Self { role: "assistant".into(), content: content.into() } }
}

/// The excerpts of one ranked document handed to a summarizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentDigest {
    pub title: String,
    pub pmcid: String,
    pub url: String,
    pub score: f32,
    pub excerpts: Vec<(Section, String)>,
}

/// Turns ranked documents into a single narrative for a role.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, role: Role, query: &str, digests: &[DocumentDigest], history: &[ChatTurn]) -> Result<String>;
}
