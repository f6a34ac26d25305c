use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{AudioFeatureVector, AudioFeatures};

/// Displayable metadata of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: String,
    pub name: String,
    /// Artist names in credit order
    pub artists: Vec<String>,
    /// May be empty when the catalog has no genre data
    #[serde(default)]
    pub genres: BTreeSet<String>,
}

/// One play of a track by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningEvent {
    pub track_id: String,
    pub played_at: DateTime<Utc>,
    /// Artists of the played track, when the history source knows them
    #[serde(default)]
    pub artists: Vec<String>,
}

/// Unjoined candidate as returned by a candidate store.
///
/// Metadata is optional because feature and metadata tables are populated
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub features: AudioFeatureVector,
    pub metadata: Option<TrackRecord>,
}

/// A recommendable track: metadata and features for the same track id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub track: TrackRecord,
    pub features: AudioFeatures,
}

impl Candidate {
    pub fn track_id(&self) -> &str {
        &self.track.track_id
    }
}

/// A candidate with its similarity score and the parts it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub track: TrackRecord,
    pub features: AudioFeatures,
    /// Final score in `[0, 1]`, the ranking key
    pub similarity_score: f64,
    pub audio_similarity: f64,
    /// Absent for audio-only queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre_similarity: Option<f64>,
    /// Absent for audio-only queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_similarity: Option<f64>,
}

impl ScoredCandidate {
    pub fn track_id(&self) -> &str {
        &self.track.track_id
    }
}

/// Orders scored candidates best-first. Equal scores fall back to track id so
/// rankings are reproducible.
pub fn rank_descending(scored: &mut [ScoredCandidate]) {
    scored.sort_by(|a, b| {
        b.similarity_score
            .total_cmp(&a.similarity_score)
            .then_with(|| a.track.track_id.cmp(&b.track.track_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            track: TrackRecord {
                track_id: id.to_string(),
                name: id.to_uppercase(),
                artists: vec!["Artist".to_string()],
                genres: BTreeSet::new(),
            },
            features: AudioFeatures::default(),
            similarity_score: score,
            audio_similarity: score,
            genre_similarity: None,
            artist_similarity: None,
        }
    }

    #[test]
    fn test_rank_descending_breaks_ties_by_track_id() {
        let mut list = vec![scored("b", 0.5), scored("c", 0.9), scored("a", 0.5)];
        rank_descending(&mut list);
        let ids: Vec<&str> = list.iter().map(|s| s.track_id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_listening_event_artists_default_to_empty() {
        let json = r#"{"track_id":"t1","played_at":"2024-05-01T10:00:00Z"}"#;
        let event: ListeningEvent = serde_json::from_str(json).unwrap();
        assert!(event.artists.is_empty());
    }

    #[test]
    fn test_scored_candidate_omits_missing_components() {
        let json = serde_json::to_value(scored("t1", 0.7)).unwrap();
        assert_eq!(json["track_id"], "t1");
        assert!(json.get("genre_similarity").is_none());
        assert!(json.get("artist_similarity").is_none());
    }
}
