use serde::{Deserialize, Serialize};

use super::AudioFeatures;

/// An artist and how often the user played them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistPreference {
    pub artist: String,
    pub play_count: u32,
}

/// Per-request picture of a listener's taste. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    /// Play-weighted average of the features of every known history track
    pub features: AudioFeatures,
    /// Most played artists first, at most ten
    pub preferred_artists: Vec<ArtistPreference>,
    /// Lowercase genre names. Only filled from caller-supplied seeds.
    pub preferred_genres: Vec<String>,
    /// Distinct history tracks that had audio features
    pub track_count: usize,
}

impl TasteProfile {
    /// Profile for a listener with no usable history
    pub fn neutral() -> Self {
        Self {
            features: AudioFeatures::neutral(),
            preferred_artists: Vec::new(),
            preferred_genres: Vec::new(),
            track_count: 0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.track_count == 0
    }

    /// Case-insensitive membership test against the preferred artists
    pub fn prefers_artist(&self, artist: &str) -> bool {
        self.preferred_artists
            .iter()
            .any(|p| p.artist.eq_ignore_ascii_case(artist.trim()))
    }
}
