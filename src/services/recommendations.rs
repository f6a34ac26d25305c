use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        ArtistPreference, AudioFeature, Candidate, ListeningEvent, RecommendationOptions,
        ScoredCandidate, TasteProfile, MAX_RESULT_LIMIT, MAX_SEEDS,
    },
    services::{
        candidates::CandidateRetriever,
        context::RequestContext,
        profile::{TasteProfileBuilder, PREFERRED_ARTIST_LIMIT},
        providers::{AudioFeatureStore, CandidateTrackStore, ListeningHistoryProvider},
        scoring::SimilarityScorer,
        similarity_index::TrackSimilarityIndex,
        weights::{SharedWeights, SimilarityWeights, WeightAdapter, WeightStore},
    },
};

/// Store read bounds for one engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub history_limit: usize,
    pub candidate_pool_limit: usize,
    pub similar_pool_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            candidate_pool_limit: 5000,
            similar_pool_limit: 1000,
        }
    }
}

/// Content-based recommendations over a user's listening history
///
/// Owns the weight vector shared by recommendation scoring and similar-track
/// search. Every query runs against a single weight snapshot.
pub struct RecommendationEngine {
    history: Arc<dyn ListeningHistoryProvider>,
    profiles: TasteProfileBuilder,
    candidates: CandidateRetriever,
    similar: TrackSimilarityIndex,
    weights: Arc<dyn WeightStore>,
    adapter: WeightAdapter,
    settings: EngineSettings,
}

impl RecommendationEngine {
    /// Engine with default weights
    pub fn new(
        history: Arc<dyn ListeningHistoryProvider>,
        features: Arc<dyn AudioFeatureStore>,
        candidates: Arc<dyn CandidateTrackStore>,
        settings: EngineSettings,
    ) -> Self {
        Self::with_weight_store(
            history,
            features,
            candidates,
            Arc::new(SharedWeights::default()),
            settings,
        )
    }

    pub fn with_weight_store(
        history: Arc<dyn ListeningHistoryProvider>,
        features: Arc<dyn AudioFeatureStore>,
        candidates: Arc<dyn CandidateTrackStore>,
        weights: Arc<dyn WeightStore>,
        settings: EngineSettings,
    ) -> Self {
        let retriever = CandidateRetriever::new(candidates);

        Self {
            history,
            profiles: TasteProfileBuilder::new(features.clone()),
            similar: TrackSimilarityIndex::new(
                features,
                retriever.clone(),
                weights.clone(),
                settings.similar_pool_limit,
            ),
            candidates: retriever,
            adapter: WeightAdapter::new(weights.clone()),
            weights,
            settings,
        }
    }

    /// Ranked tracks the user has not played yet, best first.
    ///
    /// Store failures surface as `RecommendationGenerationFailed`. Nothing is
    /// returned if `ctx` is cancelled or runs out of time.
    pub async fn generate_recommendations(
        &self,
        user_id: &str,
        options: &RecommendationOptions,
        ctx: &RequestContext,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
        }
        let limit = validate_limit(options.limit)?;

        ctx.run(self.recommend(user_id, options, limit)).await
    }

    /// Tracks that sound most like `track_id`, best first
    pub async fn find_similar_tracks(
        &self,
        track_id: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let track_id = track_id.trim();
        if track_id.is_empty() {
            return Err(AppError::InvalidInput("track_id must not be empty".to_string()));
        }
        let limit = validate_limit(limit)?;

        let started = Instant::now();
        let similar = ctx
            .run(async {
                self.similar
                    .find_similar(track_id, limit)
                    .await
                    .map_err(AppError::generation_failed)
            })
            .await?;

        tracing::info!(
            track_id = %track_id,
            returned = similar.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Found similar tracks"
        );

        Ok(similar)
    }

    /// Nudges the shared weights. Replaying the same feedback moves them again.
    pub fn update_weights(&self, feedback: &HashMap<String, f64>) {
        self.adapter.update_weights(feedback);
    }

    pub fn current_weights(&self) -> Arc<SimilarityWeights> {
        self.weights.snapshot()
    }

    async fn recommend(
        &self,
        user_id: &str,
        options: &RecommendationOptions,
        limit: usize,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let started = Instant::now();

        let (mut plays, mut exclude) = tokio::try_join!(
            async {
                self.history
                    .get_history(user_id, self.settings.history_limit)
                    .await
                    .map_err(AppError::generation_failed)
            },
            async {
                self.history
                    .heard_track_ids(user_id)
                    .await
                    .map_err(AppError::generation_failed)
            },
        )?;
        let history_events = plays.len();

        // Stores may disagree between the two reads; anything seen in either is out.
        exclude.extend(plays.iter().map(|e| e.track_id.clone()));

        let seed_tracks = normalize_seeds(&options.seed_tracks, str::to_string);
        for track_id in &seed_tracks {
            plays.push(ListeningEvent {
                track_id: track_id.clone(),
                played_at: Utc::now(),
                artists: Vec::new(),
            });
            exclude.insert(track_id.clone());
        }

        let (mut profile, pool) = tokio::try_join!(
            async {
                self.profiles
                    .build_profile(&plays)
                    .await
                    .map_err(AppError::generation_failed)
            },
            async {
                self.candidates
                    .get_candidates(&exclude, self.settings.candidate_pool_limit)
                    .await
                    .map_err(AppError::generation_failed)
            },
        )?;

        apply_seed_genres(&mut profile, &options.seed_genres);
        apply_seed_artists(&mut profile, &options.seed_artists);
        apply_target_features(&mut profile, &options.target_features);

        let candidate_count = pool.len();
        let pool = if options.include_new_music {
            pool
        } else {
            familiar_only(&profile, pool)
        };

        let scorer = SimilarityScorer::new(self.weights.snapshot());
        let mut scored = scorer.score(&profile, pool);
        scored.truncate(limit);

        tracing::info!(
            user_id = %user_id,
            history_events,
            seed_tracks = seed_tracks.len(),
            profile_tracks = profile.track_count,
            candidate_count,
            returned = scored.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated recommendations"
        );

        Ok(scored)
    }
}

/// Rejects zero and caps at [`MAX_RESULT_LIMIT`]
pub fn validate_limit(limit: usize) -> AppResult<usize> {
    if limit == 0 {
        return Err(AppError::InvalidInput("limit must be at least 1".to_string()));
    }
    Ok(limit.min(MAX_RESULT_LIMIT))
}

/// Trimmed, non-empty, first occurrence wins, at most [`MAX_SEEDS`]
fn normalize_seeds(seeds: &[String], key: impl Fn(&str) -> String) -> Vec<String> {
    let mut seen = HashSet::new();
    seeds
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(key(*s)))
        .take(MAX_SEEDS)
        .map(str::to_string)
        .collect()
}

/// Replaces the profile's genre preferences with the caller's seeds
fn apply_seed_genres(profile: &mut TasteProfile, seed_genres: &[String]) {
    profile.preferred_genres = normalize_seeds(seed_genres, str::to_lowercase)
        .into_iter()
        .map(|g| g.to_lowercase())
        .collect();
}

/// Puts seed artists ahead of the ones learned from history
fn apply_seed_artists(profile: &mut TasteProfile, seed_artists: &[String]) {
    let mut seeds: Vec<ArtistPreference> = normalize_seeds(seed_artists, str::to_lowercase)
        .into_iter()
        .filter(|artist| !profile.prefers_artist(artist))
        .map(|artist| ArtistPreference {
            artist,
            play_count: 0,
        })
        .collect();
    if seeds.is_empty() {
        return;
    }

    seeds.append(&mut profile.preferred_artists);
    seeds.truncate(PREFERRED_ARTIST_LIMIT);
    profile.preferred_artists = seeds;
}

/// Overrides profile features with explicit targets. Unknown names and non-finite values are skipped.
fn apply_target_features(profile: &mut TasteProfile, targets: &HashMap<String, f64>) {
    // Sorted so a name given twice in different case resolves the same way every time
    let targets: BTreeMap<&str, f64> = targets.iter().map(|(k, v)| (k.as_str(), *v)).collect();

    for (name, value) in targets {
        if !value.is_finite() {
            tracing::debug!(feature = %name, "Ignoring non-finite target");
            continue;
        }

        if name.trim().eq_ignore_ascii_case("loudness") {
            profile.features.loudness = Some(value);
            continue;
        }

        match AudioFeature::from_str(name) {
            Ok(feature) => profile.features.set(feature, value),
            Err(_) => tracing::debug!(feature = %name, "Ignoring unknown target feature"),
        }
    }
}

/// Keeps candidates by at least one artist the user already plays
fn familiar_only(profile: &TasteProfile, pool: Vec<Candidate>) -> Vec<Candidate> {
    pool.into_iter()
        .filter(|candidate| {
            candidate
                .track
                .artists
                .iter()
                .any(|artist| profile.prefers_artist(artist))
        })
        .collect()
}
