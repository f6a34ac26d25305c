use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{rank_descending, AudioFeature, AudioFeatures, ScoredCandidate},
    services::{
        candidates::CandidateRetriever, providers::AudioFeatureStore, weights::SimilarityWeights,
        weights::WeightStore,
    },
};

/// Nearest-neighbour search on audio features alone, for "more like this track"
#[derive(Clone)]
pub struct TrackSimilarityIndex {
    features: Arc<dyn AudioFeatureStore>,
    candidates: CandidateRetriever,
    weights: Arc<dyn WeightStore>,
    pool_limit: usize,
}

impl TrackSimilarityIndex {
    pub fn new(
        features: Arc<dyn AudioFeatureStore>,
        candidates: CandidateRetriever,
        weights: Arc<dyn WeightStore>,
        pool_limit: usize,
    ) -> Self {
        Self {
            features,
            candidates,
            weights,
            pool_limit,
        }
    }

    /// Top `limit` tracks closest to the seed, best first. Never returns the seed.
    pub async fn find_similar(&self, seed_track_id: &str, limit: usize) -> AppResult<Vec<ScoredCandidate>> {
        let seed = self
            .features
            .get_features(&[seed_track_id.to_string()])
            .await?
            .into_iter()
            .find(|vector| vector.track_id == seed_track_id)
            .ok_or_else(|| AppError::TrackNotFound(seed_track_id.to_string()))?;

        let exclude: HashSet<String> = [seed_track_id.to_string()].into_iter().collect();
        let pool = self.candidates.get_candidates(&exclude, self.pool_limit).await?;

        let weights = self.weights.snapshot();
        let mut scored: Vec<ScoredCandidate> = pool
            .into_iter()
            .filter(|candidate| candidate.track_id() != seed_track_id)
            .map(|candidate| {
                let score = closeness(&seed.features, &candidate.features, &weights);
                ScoredCandidate {
                    similarity_score: score,
                    audio_similarity: score,
                    genre_similarity: None,
                    artist_similarity: None,
                    track: candidate.track,
                    features: candidate.features,
                }
            })
            .collect();

        rank_descending(&mut scored);
        scored.truncate(limit);

        tracing::debug!(
            seed = %seed_track_id,
            returned = scored.len(),
            "Similar tracks ranked"
        );

        Ok(scored)
    }
}

/// Weighted sum of `1 - |a - b|` over every feature axis.
///
/// Weights sum to one and each term is in `[0, 1]`, so the result is too.
/// Unlike cosine, two quiet tracks and two loud tracks are not the same direction.
pub fn closeness(seed: &AudioFeatures, other: &AudioFeatures, weights: &SimilarityWeights) -> f64 {
    AudioFeature::ALL
        .into_iter()
        .map(|feature| {
            let distance = (seed.axis(feature) - other.axis(feature)).abs();
            weights.get(feature) * (1.0 - distance)
        })
        .sum::<f64>()
        .clamp(0.0, 1.0)
}
