pub mod candidates;
pub mod context;
pub mod profile;
pub mod providers;
pub mod recommendations;
pub mod scoring;
pub mod similarity_index;
pub mod weights;

pub use candidates::CandidateRetriever;
pub use context::RequestContext;
pub use profile::TasteProfileBuilder;
pub use recommendations::{EngineSettings, RecommendationEngine};
pub use scoring::SimilarityScorer;
pub use similarity_index::TrackSimilarityIndex;
pub use weights::{SharedWeights, SimilarityWeights, WeightAdapter, WeightStore};
