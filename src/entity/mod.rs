pub mod aliases;
pub mod classification;
pub mod gazetteer;
pub mod normalizer;
pub mod types;

pub use classification::{Category, EventType};
pub use gazetteer::Gazetteer;
pub use normalizer::{NormalizedText, TextNormalizer};
pub use types::*;

// Module-level constants
pub const TARGET_ENTITY: &str = "entity";
