//! PostgreSQL catalog
//!
//! Reads plays, audio features and track metadata from the tables created by
//! `migrations/0001_create_catalog.sql`. Features and metadata are stored in
//! separate tables, so candidate rows come back with optional metadata.
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::instrument;

use crate::{
    error::AppResult,
    models::{AudioFeatureVector, AudioFeatures, CandidateRow, ListeningEvent, TrackRecord},
    services::providers::{AudioFeatureStore, CandidateTrackStore, ListeningHistoryProvider},
};

#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FeatureRow {
    track_id: String,
    danceability: Option<f64>,
    energy: Option<f64>,
    valence: Option<f64>,
    acousticness: Option<f64>,
    instrumentalness: Option<f64>,
    speechiness: Option<f64>,
    liveness: Option<f64>,
    tempo: Option<f64>,
    loudness: Option<f64>,
}

impl From<FeatureRow> for AudioFeatureVector {
    fn from(row: FeatureRow) -> Self {
        AudioFeatureVector {
            track_id: row.track_id,
            features: AudioFeatures {
                danceability: row.danceability,
                energy: row.energy,
                valence: row.valence,
                acousticness: row.acousticness,
                instrumentalness: row.instrumentalness,
                speechiness: row.speechiness,
                liveness: row.liveness,
                tempo: row.tempo,
                loudness: row.loudness,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    track_id: String,
    played_at: DateTime<Utc>,
    artists: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct CandidateDbRow {
    #[sqlx(flatten)]
    features: FeatureRow,
    name: Option<String>,
    artists: Option<Vec<String>>,
    genres: Option<Vec<String>>,
}

impl From<CandidateDbRow> for CandidateRow {
    fn from(row: CandidateDbRow) -> Self {
        let metadata = row.name.map(|name| TrackRecord {
            track_id: row.features.track_id.clone(),
            name,
            artists: row.artists.unwrap_or_default(),
            genres: row.genres.unwrap_or_default().into_iter().collect(),
        });

        CandidateRow {
            features: row.features.into(),
            metadata,
        }
    }
}

#[async_trait::async_trait]
impl ListeningHistoryProvider for PostgresCatalog {
    #[instrument(skip(self), err)]
    async fn get_history(&self, user_id: &str, limit: usize) -> AppResult<Vec<ListeningEvent>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT e.track_id, e.played_at, COALESCE(t.artists, '{}') AS artists
            FROM listening_events e
            LEFT JOIN tracks t ON t.track_id = e.track_id
            WHERE e.user_id = $1
            ORDER BY e.played_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ListeningEvent {
                track_id: row.track_id,
                played_at: row.played_at,
                artists: row.artists,
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn heard_track_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT track_id
            FROM listening_events
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl AudioFeatureStore for PostgresCatalog {
    #[instrument(skip_all, fields(requested = track_ids.len()), err)]
    async fn get_features(&self, track_ids: &[String]) -> AppResult<Vec<AudioFeatureVector>> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<FeatureRow> = sqlx::query_as(
            r#"
            SELECT track_id, danceability, energy, valence, acousticness, instrumentalness,
                   speechiness, liveness, tempo, loudness
            FROM audio_features
            WHERE track_id = ANY($1)
            "#,
        )
        .bind(track_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AudioFeatureVector::from).collect())
    }
}

#[async_trait::async_trait]
impl CandidateTrackStore for PostgresCatalog {
    #[instrument(skip(self, exclude_track_ids), fields(excluded = exclude_track_ids.len()), err)]
    async fn get_candidates(
        &self,
        exclude_track_ids: &HashSet<String>,
        limit: usize,
    ) -> AppResult<Vec<CandidateRow>> {
        let excluded: Vec<String> = exclude_track_ids.iter().cloned().collect();

        let rows: Vec<CandidateDbRow> = sqlx::query_as(
            r#"
            SELECT f.track_id, f.danceability, f.energy, f.valence, f.acousticness,
                   f.instrumentalness, f.speechiness, f.liveness, f.tempo, f.loudness,
                   t.name, t.artists, t.genres
            FROM audio_features f
            LEFT JOIN tracks t ON t.track_id = f.track_id
            WHERE NOT (f.track_id = ANY($1))
            ORDER BY f.track_id
            LIMIT $2
            "#,
        )
        .bind(&excluded)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CandidateRow::from).collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
