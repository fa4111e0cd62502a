pub mod engine;
pub mod recommendations;

pub use engine::{EngineError, PopularityScorer, RecommendationEngine, Scorer};
pub use recommendations::RecommendationService;
