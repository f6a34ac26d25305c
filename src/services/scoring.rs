use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::{
    models::{rank_descending, AudioFeature, AudioFeatures, Candidate, ScoredCandidate, TasteProfile},
    services::weights::SimilarityWeights,
};

/// Share of the final score taken by each component
pub const AUDIO_SHARE: f64 = 0.7;
pub const GENRE_SHARE: f64 = 0.2;
pub const ARTIST_SHARE: f64 = 0.1;

/// Genre score when the profile has no genre preferences
pub const NEUTRAL_GENRE_SIMILARITY: f64 = 0.5;
/// Genre score for a candidate without genre data. Lower than neutral on purpose.
pub const UNTAGGED_GENRE_SIMILARITY: f64 = 0.3;

pub const ARTIST_MATCH_SIMILARITY: f64 = 1.0;
/// Kept above zero so an unknown artist can still rank on sound alone
pub const ARTIST_MISS_SIMILARITY: f64 = 0.1;
pub const NEUTRAL_ARTIST_SIMILARITY: f64 = 0.5;

/// Ranks candidates against a taste profile.
///
/// Holds one weight snapshot for the whole pass.
pub struct SimilarityScorer {
    weights: Arc<SimilarityWeights>,
}

impl SimilarityScorer {
    pub fn new(weights: Arc<SimilarityWeights>) -> Self {
        Self { weights }
    }

    /// Scores every candidate once and returns them best-first
    pub fn score(&self, profile: &TasteProfile, candidates: Vec<Candidate>) -> Vec<ScoredCandidate> {
        let preferred_artists: HashSet<String> = profile
            .preferred_artists
            .iter()
            .map(|p| p.artist.trim().to_lowercase())
            .collect();
        let preferred_genres: HashSet<String> = profile
            .preferred_genres
            .iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect();

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let audio = weighted_cosine(&profile.features, &candidate.features, &self.weights);
                let genre = genre_similarity(&preferred_genres, &candidate.track.genres);
                let artist = artist_similarity(&preferred_artists, &candidate.track.artists);

                ScoredCandidate {
                    similarity_score: combine(audio, genre, artist),
                    audio_similarity: audio,
                    genre_similarity: Some(genre),
                    artist_similarity: Some(artist),
                    track: candidate.track,
                    features: candidate.features,
                }
            })
            .collect();

        rank_descending(&mut scored);
        scored
    }
}

/// Final blend of the three components, in `[0, 1]`
pub fn combine(audio: f64, genre: f64, artist: f64) -> f64 {
    (AUDIO_SHARE * audio + GENRE_SHARE * genre + ARTIST_SHARE * artist).clamp(0.0, 1.0)
}

/// Cosine similarity after scaling every axis by its weight.
///
/// Both vectors live on the `[0, 1]` similarity axes, so the result is in
/// `[0, 1]`. A zero vector has no direction and scores 0.
pub fn weighted_cosine(a: &AudioFeatures, b: &AudioFeatures, weights: &SimilarityWeights) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);

    for feature in AudioFeature::ALL {
        let weight = weights.get(feature);
        let x = a.axis(feature) * weight;
        let y = b.axis(feature) * weight;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Jaccard index of the preferred genres and the candidate's genres.
///
/// `preferred` must already be lowercase.
pub fn genre_similarity(preferred: &HashSet<String>, candidate: &BTreeSet<String>) -> f64 {
    if preferred.is_empty() {
        return NEUTRAL_GENRE_SIMILARITY;
    }

    let tagged: HashSet<String> = candidate
        .iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect();
    if tagged.is_empty() {
        return UNTAGGED_GENRE_SIMILARITY;
    }

    let intersection = preferred.intersection(&tagged).count();
    let union = preferred.union(&tagged).count();
    intersection as f64 / union as f64
}

/// 1.0 when any credited artist is preferred. `preferred` must already be lowercase.
pub fn artist_similarity(preferred: &HashSet<String>, artists: &[String]) -> f64 {
    if preferred.is_empty() {
        return NEUTRAL_ARTIST_SIMILARITY;
    }

    if artists
        .iter()
        .any(|artist| preferred.contains(&artist.trim().to_lowercase()))
    {
        ARTIST_MATCH_SIMILARITY
    } else {
        ARTIST_MISS_SIMILARITY
    }
}
