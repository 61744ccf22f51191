use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration, including provider credentials.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding matrix and metadata disagree, or the matrix itself is malformed.
    #[error("Corpus integrity violation: {0}")]
    CorpusIntegrity(String),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// An embedding or summarization call failed.
    #[error("External dependency failed: {0}")]
    ExternalDependency(String),

    /// A dependency is not configured; the service runs degraded.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
