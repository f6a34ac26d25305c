use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        ArtistPreference, AudioFeature, AudioFeatureVector, AudioFeatures, ListeningEvent,
        TasteProfile,
    },
    services::providers::AudioFeatureStore,
};

/// How many artists a profile keeps
pub const PREFERRED_ARTIST_LIMIT: usize = 10;

/// Turns a listening history into a taste profile
#[derive(Clone)]
pub struct TasteProfileBuilder {
    features: Arc<dyn AudioFeatureStore>,
}

impl TasteProfileBuilder {
    pub fn new(features: Arc<dyn AudioFeatureStore>) -> Self {
        Self { features }
    }

    /// Looks up features for every distinct history track and aggregates them.
    ///
    /// A history without any known features yields the neutral profile.
    pub async fn build_profile(&self, history: &[ListeningEvent]) -> AppResult<TasteProfile> {
        let track_ids = distinct_track_ids(history);
        if track_ids.is_empty() {
            return Ok(TasteProfile::neutral());
        }

        let features = self.features.get_features(&track_ids).await?;

        tracing::debug!(
            history_tracks = track_ids.len(),
            with_features = features.len(),
            "Fetched history features"
        );

        Ok(aggregate_profile(history, &features))
    }
}

/// Track ids in first-played order, without repeats
pub fn distinct_track_ids(history: &[ListeningEvent]) -> Vec<String> {
    let mut seen = HashSet::new();
    history
        .iter()
        .filter(|event| seen.insert(event.track_id.as_str()))
        .map(|event| event.track_id.clone())
        .collect()
}

/// Builds a profile from plays and the features known for them.
///
/// Each track counts with weight `ln(play_count + 1)`, so heavy replays add
/// less and less.
pub fn aggregate_profile(history: &[ListeningEvent], features: &[AudioFeatureVector]) -> TasteProfile {
    let mut play_counts: HashMap<&str, u32> = HashMap::new();
    for event in history {
        *play_counts.entry(event.track_id.as_str()).or_insert(0) += 1;
    }

    // Stores may repeat rows; the first one for a track wins. Ordered so the
    // floating-point sums come out identical on every call.
    let mut known: BTreeMap<&str, &AudioFeatures> = BTreeMap::new();
    for vector in features {
        if play_counts.contains_key(vector.track_id.as_str()) {
            known.entry(vector.track_id.as_str()).or_insert(&vector.features);
        }
    }

    if known.is_empty() {
        return TasteProfile::neutral();
    }

    let mut sums = [0.0_f64; AudioFeature::COUNT];
    let mut loudness_sum = 0.0;
    let mut total_weight = 0.0;

    for (track_id, track_features) in &known {
        let weight = f64::from(play_counts[track_id] + 1).ln();
        for feature in AudioFeature::ALL {
            sums[feature.index()] += weight * track_features.value(feature);
        }
        loudness_sum += weight * track_features.loudness_db();
        total_weight += weight;
    }

    let mut averaged = AudioFeatures::default();
    for feature in AudioFeature::ALL {
        averaged.set(feature, sums[feature.index()] / total_weight);
    }
    averaged.loudness = Some(loudness_sum / total_weight);

    TasteProfile {
        features: averaged,
        preferred_artists: rank_artists(history),
        preferred_genres: Vec::new(),
        track_count: known.len(),
    }
}

/// Artists ordered by plays across all their tracks, ties by name
fn rank_artists(history: &[ListeningEvent]) -> Vec<ArtistPreference> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for event in history {
        let mut credited = HashSet::new();
        for artist in event.artists.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
            if credited.insert(artist) {
                *counts.entry(artist).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<ArtistPreference> = counts
        .into_iter()
        .map(|(artist, play_count)| ArtistPreference {
            artist: artist.to_string(),
            play_count,
        })
        .collect();
    ranked.sort_by(|a, b| b.play_count.cmp(&a.play_count).then_with(|| a.artist.cmp(&b.artist)));
    ranked.truncate(PREFERRED_ARTIST_LIMIT);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::providers::MockAudioFeatureStore;
    use chrono::Utc;

    fn play(track_id: &str, artists: &[&str]) -> ListeningEvent {
        ListeningEvent {
            track_id: track_id.to_string(),
            played_at: Utc::now(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn with_energy(track_id: &str, energy: f64) -> AudioFeatureVector {
        AudioFeatureVector::new(
            track_id,
            AudioFeatures {
                energy: Some(energy),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_empty_history_is_neutral_without_lookup() {
        let mut store = MockAudioFeatureStore::new();
        store.expect_get_features().never();

        let builder = TasteProfileBuilder::new(Arc::new(store));
        let profile = builder.build_profile(&[]).await.unwrap();
        assert_eq!(profile, TasteProfile::neutral());
    }

    #[tokio::test]
    async fn test_history_without_features_is_neutral() {
        let mut store = MockAudioFeatureStore::new();
        store.expect_get_features().times(1).returning(|_| Ok(vec![]));

        let builder = TasteProfileBuilder::new(Arc::new(store));
        let history = vec![play("a", &["Burial"]), play("b", &["Burial"])];
        let profile = builder.build_profile(&history).await.unwrap();

        assert_eq!(profile.features, AudioFeatures::neutral());
        assert!(profile.preferred_artists.is_empty());
        assert_eq!(profile.track_count, 0);
    }

    #[tokio::test]
    async fn test_lookup_requests_distinct_ids_once() {
        let mut store = MockAudioFeatureStore::new();
        store
            .expect_get_features()
            .withf(|ids: &[String]| ids == ["a".to_string(), "b".to_string()])
            .times(1)
            .returning(|_| Ok(vec![with_energy("a", 0.4)]));

        let builder = TasteProfileBuilder::new(Arc::new(store));
        let history = vec![play("a", &[]), play("b", &[]), play("a", &[])];
        let profile = builder.build_profile(&history).await.unwrap();
        assert_eq!(profile.track_count, 1);
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let mut store = MockAudioFeatureStore::new();
        store
            .expect_get_features()
            .returning(|_| Err(AppError::Internal("timeout".to_string())));

        let builder = TasteProfileBuilder::new(Arc::new(store));
        let result = builder.build_profile(&[play("a", &[])]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_repeat_plays_pull_profile_toward_track() {
        let history = vec![play("A", &[]), play("A", &[]), play("B", &[])];
        let features = vec![with_energy("A", 0.9), with_energy("B", 0.2)];

        let profile = aggregate_profile(&history, &features);
        let energy = profile.features.value(AudioFeature::Energy);

        assert!((energy - 0.9).abs() < (energy - 0.2).abs());
        let expected = (3f64.ln() * 0.9 + 2f64.ln() * 0.2) / (3f64.ln() + 2f64.ln());
        assert!((energy - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_feature_values_count_as_neutral() {
        let history = vec![play("A", &[])];
        let profile = aggregate_profile(&history, &[with_energy("A", 0.8)]);

        assert_eq!(profile.features.value(AudioFeature::Danceability), 0.5);
        assert_eq!(profile.features.tempo_bpm(), 120.0);
        assert_eq!(profile.features.loudness_db(), -10.0);
        assert!((profile.features.value(AudioFeature::Energy) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_features_for_unplayed_tracks_are_ignored() {
        let history = vec![play("A", &[])];
        let features = vec![with_energy("A", 0.1), with_energy("Z", 1.0)];
        let profile = aggregate_profile(&history, &features);
        assert!((profile.features.value(AudioFeature::Energy) - 0.1).abs() < 1e-12);
        assert_eq!(profile.track_count, 1);
    }

    #[test]
    fn test_artist_ranking_counts_every_play() {
        let history = vec![
            play("a", &["Four Tet"]),
            play("b", &["Four Tet", "Burial"]),
            play("c", &["Burial"]),
            play("c", &["Burial"]),
            play("d", &["Caribou"]),
        ];
        let profile = aggregate_profile(&history, &[with_energy("a", 0.5)]);

        let ranked: Vec<(&str, u32)> = profile
            .preferred_artists
            .iter()
            .map(|p| (p.artist.as_str(), p.play_count))
            .collect();
        assert_eq!(ranked, vec![("Burial", 3), ("Four Tet", 2), ("Caribou", 1)]);
    }

    #[test]
    fn test_artist_ranking_keeps_top_ten() {
        let history: Vec<ListeningEvent> = (0..15)
            .flat_map(|i| {
                let artist = format!("Artist {:02}", i);
                (0..=i).map(move |_| play("t", &[artist.as_str()]))
            })
            .collect();
        let profile = aggregate_profile(&history, &[with_energy("t", 0.5)]);

        assert_eq!(profile.preferred_artists.len(), PREFERRED_ARTIST_LIMIT);
        assert_eq!(profile.preferred_artists[0].artist, "Artist 14");
        assert_eq!(profile.preferred_artists[0].play_count, 15);
    }

    #[test]
    fn test_genres_are_never_inferred() {
        let history = vec![play("A", &["X"])];
        let profile = aggregate_profile(&history, &[with_energy("A", 0.3)]);
        assert!(profile.preferred_genres.is_empty());
    }
}
