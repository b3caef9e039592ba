// Module declarations
pub mod assignment;
pub mod engine;
pub mod metadata;
pub mod selection;
pub mod significance;
pub mod similarity;
pub mod types;

pub use types::*;

pub use engine::{ClusterEngine, Clock};
pub use metadata::derive_meta;
pub use selection::{rank_top_stories, DEFAULT_LIST_LIMIT};
pub use significance::{classify_trend, score_timeline, Timeline};
pub use similarity::{find_best_match, similarity_breakdown, ClusterMatch, MatchQuery};
