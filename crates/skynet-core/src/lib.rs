pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, ChunkHit, ChunkRecord, NodeKind, RankedDocument, Role, RoleWeights, Section, TopicNode};
