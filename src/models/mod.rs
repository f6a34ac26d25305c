use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod audio_features;
mod profile;
mod track;

pub use audio_features::{
    AudioFeature, AudioFeatureVector, AudioFeatures, NEUTRAL_FEATURE_VALUE, NEUTRAL_LOUDNESS_DB,
    NEUTRAL_TEMPO_BPM, TEMPO_AXIS_MAX_BPM,
};
pub use profile::{ArtistPreference, TasteProfile};
pub use track::{rank_descending, Candidate, CandidateRow, ListeningEvent, ScoredCandidate, TrackRecord};

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 20;
pub const DEFAULT_SIMILAR_LIMIT: usize = 10;
/// Upper bound on any result list handed back to a caller
pub const MAX_RESULT_LIMIT: usize = 100;
/// Each seed list is cut to this many distinct entries
pub const MAX_SEEDS: usize = 5;

/// Caller knobs for `generate_recommendations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOptions {
    #[serde(default = "default_recommendation_limit")]
    pub limit: usize,

    /// When false, only unheard tracks by artists the user already plays are considered
    #[serde(default = "default_include_new_music")]
    pub include_new_music: bool,

    /// Genres the caller wants the profile to favour
    #[serde(default)]
    pub seed_genres: Vec<String>,

    /// Tracks that count as extra plays. They are never recommended back.
    #[serde(default)]
    pub seed_tracks: Vec<String>,

    /// Artists treated as preferred on top of the history
    #[serde(default)]
    pub seed_artists: Vec<String>,

    /// Feature name to target value, overriding what the history says
    #[serde(default)]
    pub target_features: HashMap<String, f64>,
}

fn default_recommendation_limit() -> usize {
    DEFAULT_RECOMMENDATION_LIMIT
}

fn default_include_new_music() -> bool {
    true
}

impl Default for RecommendationOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RECOMMENDATION_LIMIT,
            include_new_music: true,
            seed_genres: Vec::new(),
            seed_tracks: Vec::new(),
            seed_artists: Vec::new(),
            target_features: HashMap::new(),
        }
    }
}

impl RecommendationOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}
