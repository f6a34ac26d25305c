use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{AudioFeatureVector, CandidateRow, ListeningEvent, TrackRecord},
    services::providers::{AudioFeatureStore, CandidateTrackStore, ListeningHistoryProvider},
};

/// Serialized form of a catalog, as read from `CATALOG_PATH`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub features: Vec<AudioFeatureVector>,
    /// Plays keyed by user id
    #[serde(default)]
    pub history: HashMap<String, Vec<ListeningEvent>>,
}

#[derive(Default)]
struct CatalogData {
    tracks: BTreeMap<String, TrackRecord>,
    features: BTreeMap<String, AudioFeatureVector>,
    history: HashMap<String, Vec<ListeningEvent>>,
}

/// Catalog held entirely in memory.
///
/// Implements every store trait. Candidates come out in track id order so runs
/// are reproducible.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let data = CatalogData {
            tracks: snapshot
                .tracks
                .into_iter()
                .map(|t| (t.track_id.clone(), t))
                .collect(),
            features: snapshot
                .features
                .into_iter()
                .map(|f| (f.track_id.clone(), f))
                .collect(),
            history: snapshot.history,
        };

        Self {
            inner: RwLock::new(data),
        }
    }

    /// Loads a catalog from a JSON file
    pub async fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Internal(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&raw).map_err(|e| {
            AppError::Internal(format!("Invalid catalog {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            tracks = snapshot.tracks.len(),
            features = snapshot.features.len(),
            users = snapshot.history.len(),
            "Loaded in-memory catalog"
        );

        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn insert_track(&self, track: TrackRecord) {
        let mut inner = self.inner.write().await;
        inner.tracks.insert(track.track_id.clone(), track);
    }

    pub async fn insert_features(&self, features: AudioFeatureVector) {
        let mut inner = self.inner.write().await;
        inner.features.insert(features.track_id.clone(), features);
    }

    pub async fn record_play(&self, user_id: &str, event: ListeningEvent) {
        let mut inner = self.inner.write().await;
        inner
            .history
            .entry(user_id.to_string())
            .or_default()
            .push(event);
    }
}

#[async_trait::async_trait]
impl ListeningHistoryProvider for InMemoryCatalog {
    async fn get_history(&self, user_id: &str, limit: usize) -> AppResult<Vec<ListeningEvent>> {
        let inner = self.inner.read().await;

        let mut events: Vec<ListeningEvent> = inner.history.get(user_id).cloned().unwrap_or_default();
        // Newest first, like the SQL query. Stable, so ties keep insertion order.
        events.sort_by(|a, b| b.played_at.cmp(&a.played_at));
        events.truncate(limit);

        // Same enrichment the SQL join does: artists come from track metadata when the play lacks them
        for event in events.iter_mut().filter(|e| e.artists.is_empty()) {
            if let Some(track) = inner.tracks.get(&event.track_id) {
                event.artists = track.artists.clone();
            }
        }

        Ok(events)
    }

    async fn heard_track_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let inner = self.inner.read().await;

        Ok(inner
            .history
            .get(user_id)
            .map(|events| events.iter().map(|e| e.track_id.clone()).collect())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl AudioFeatureStore for InMemoryCatalog {
    async fn get_features(&self, track_ids: &[String]) -> AppResult<Vec<AudioFeatureVector>> {
        let inner = self.inner.read().await;
        let mut seen = HashSet::new();

        Ok(track_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| inner.features.get(id).cloned())
            .collect())
    }
}

#[async_trait::async_trait]
impl CandidateTrackStore for InMemoryCatalog {
    async fn get_candidates(
        &self,
        exclude_track_ids: &HashSet<String>,
        limit: usize,
    ) -> AppResult<Vec<CandidateRow>> {
        let inner = self.inner.read().await;

        Ok(inner
            .features
            .values()
            .filter(|f| !exclude_track_ids.contains(&f.track_id))
            .take(limit)
            .map(|f| CandidateRow {
                features: f.clone(),
                metadata: inner.tracks.get(&f.track_id).cloned(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
