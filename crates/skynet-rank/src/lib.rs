//! skynet-rank
//!
//! Role-aware document ranking: chunk similarities are weighted by section,
//! boosted by role-specific content features and summed per document.

pub mod boost;
pub mod ranker;

pub use boost::{BoostRule, FeatureBoost};
pub use ranker::{Ranker, RankerOptions};
