use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Value used for any normalized feature a track is missing
pub const NEUTRAL_FEATURE_VALUE: f64 = 0.5;
/// Tempo assumed when a track (or an empty profile) has none
pub const NEUTRAL_TEMPO_BPM: f64 = 120.0;
/// Loudness assumed when a track (or an empty profile) has none
pub const NEUTRAL_LOUDNESS_DB: f64 = -10.0;
/// Tempo that maps to 1.0 on the similarity axis. Faster tracks saturate.
pub const TEMPO_AXIS_MAX_BPM: f64 = 250.0;

/// The features that take part in similarity scoring and carry a weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFeature {
    Danceability,
    Energy,
    Valence,
    Acousticness,
    Instrumentalness,
    Speechiness,
    Liveness,
    Tempo,
}

impl AudioFeature {
    pub const COUNT: usize = 8;

    /// Every weighted feature, in weight-vector order
    pub const ALL: [AudioFeature; AudioFeature::COUNT] = [
        AudioFeature::Danceability,
        AudioFeature::Energy,
        AudioFeature::Valence,
        AudioFeature::Acousticness,
        AudioFeature::Instrumentalness,
        AudioFeature::Speechiness,
        AudioFeature::Liveness,
        AudioFeature::Tempo,
    ];

    /// Position of this feature in weight vectors
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioFeature::Danceability => "danceability",
            AudioFeature::Energy => "energy",
            AudioFeature::Valence => "valence",
            AudioFeature::Acousticness => "acousticness",
            AudioFeature::Instrumentalness => "instrumentalness",
            AudioFeature::Speechiness => "speechiness",
            AudioFeature::Liveness => "liveness",
            AudioFeature::Tempo => "tempo",
        }
    }

    /// Exact, case-sensitive lookup by canonical name
    pub fn from_name(name: &str) -> Option<Self> {
        AudioFeature::ALL.into_iter().find(|feature| feature.as_str() == name)
    }

    /// True for the seven features that live in `[0, 1]`
    pub fn is_normalized(self) -> bool {
        !matches!(self, AudioFeature::Tempo)
    }
}

impl Display for AudioFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        AudioFeature::ALL
            .into_iter()
            .find(|feature| feature.as_str() == name)
            .ok_or_else(|| format!("unknown audio feature '{}'", s))
    }
}

/// Audio descriptors of a single track or of a taste profile.
///
/// Every field is optional because upstream catalogs are patchy. Readers go
/// through [`AudioFeatures::value`], [`AudioFeatures::tempo_bpm`] and
/// [`AudioFeatures::loudness_db`], which substitute the neutral defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub instrumentalness: Option<f64>,
    #[serde(default)]
    pub speechiness: Option<f64>,
    #[serde(default)]
    pub liveness: Option<f64>,
    /// Beats per minute
    #[serde(default)]
    pub tempo: Option<f64>,
    /// Decibels, usually negative
    #[serde(default)]
    pub loudness: Option<f64>,
}

impl AudioFeatures {
    /// The profile used when nothing is known about a listener
    pub fn neutral() -> Self {
        Self {
            danceability: Some(NEUTRAL_FEATURE_VALUE),
            energy: Some(NEUTRAL_FEATURE_VALUE),
            valence: Some(NEUTRAL_FEATURE_VALUE),
            acousticness: Some(NEUTRAL_FEATURE_VALUE),
            instrumentalness: Some(NEUTRAL_FEATURE_VALUE),
            speechiness: Some(NEUTRAL_FEATURE_VALUE),
            liveness: Some(NEUTRAL_FEATURE_VALUE),
            tempo: Some(NEUTRAL_TEMPO_BPM),
            loudness: Some(NEUTRAL_LOUDNESS_DB),
        }
    }

    fn slot(&self, feature: AudioFeature) -> Option<f64> {
        match feature {
            AudioFeature::Danceability => self.danceability,
            AudioFeature::Energy => self.energy,
            AudioFeature::Valence => self.valence,
            AudioFeature::Acousticness => self.acousticness,
            AudioFeature::Instrumentalness => self.instrumentalness,
            AudioFeature::Speechiness => self.speechiness,
            AudioFeature::Liveness => self.liveness,
            AudioFeature::Tempo => self.tempo,
        }
    }

    fn slot_mut(&mut self, feature: AudioFeature) -> &mut Option<f64> {
        match feature {
            AudioFeature::Danceability => &mut self.danceability,
            AudioFeature::Energy => &mut self.energy,
            AudioFeature::Valence => &mut self.valence,
            AudioFeature::Acousticness => &mut self.acousticness,
            AudioFeature::Instrumentalness => &mut self.instrumentalness,
            AudioFeature::Speechiness => &mut self.speechiness,
            AudioFeature::Liveness => &mut self.liveness,
            AudioFeature::Tempo => &mut self.tempo,
        }
    }

    /// Resolved value of a feature in its natural unit.
    ///
    /// Normalized features are clamped into `[0, 1]` and fall back to 0.5;
    /// tempo falls back to 120 BPM.
    pub fn value(&self, feature: AudioFeature) -> f64 {
        match feature {
            AudioFeature::Tempo => self.tempo_bpm(),
            _ => self
                .slot(feature)
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(NEUTRAL_FEATURE_VALUE),
        }
    }

    /// Value of a feature on the `[0, 1]` similarity axis
    pub fn axis(&self, feature: AudioFeature) -> f64 {
        match feature {
            AudioFeature::Tempo => (self.tempo_bpm() / TEMPO_AXIS_MAX_BPM).clamp(0.0, 1.0),
            _ => self.value(feature),
        }
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(NEUTRAL_TEMPO_BPM)
    }

    pub fn loudness_db(&self) -> f64 {
        self.loudness
            .filter(|l| l.is_finite())
            .unwrap_or(NEUTRAL_LOUDNESS_DB)
    }

    /// Overwrites one weighted feature. Normalized features are clamped into `[0, 1]`.
    pub fn set(&mut self, feature: AudioFeature, value: f64) {
        let value = if feature.is_normalized() {
            value.clamp(0.0, 1.0)
        } else {
            value
        };
        *self.slot_mut(feature) = Some(value);
    }
}

/// Audio features keyed by the track they describe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatureVector {
    pub track_id: String,
    #[serde(flatten)]
    pub features: AudioFeatures,
}

impl AudioFeatureVector {
    pub fn new(track_id: impl Into<String>, features: AudioFeatures) -> Self {
        Self {
            track_id: track_id.into(),
            features,
        }
    }
}
