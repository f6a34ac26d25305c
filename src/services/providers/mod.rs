//! Data sources the engine reads from
//!
//! Listening history, audio features and candidate tracks live in systems
//! outside the engine. Each is reached through one of the traits below so the
//! engine can run against PostgreSQL in production and an in-memory catalog in
//! tests and local runs.
use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{AudioFeatureVector, CandidateRow, ListeningEvent},
};

pub mod memory;
pub mod postgres;

pub use memory::{CatalogSnapshot, InMemoryCatalog};
pub use postgres::PostgresCatalog;

/// Source of a user's plays
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ListeningHistoryProvider: Send + Sync {
    /// Returns up to `limit` plays of `user_id`, most recent first.
    async fn get_history(&self, user_id: &str, limit: usize) -> AppResult<Vec<ListeningEvent>>;

    /// Every track `user_id` has ever played, regardless of any history window
    async fn heard_track_ids(&self, user_id: &str) -> AppResult<HashSet<String>>;
}

/// Lookup of precomputed audio features
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AudioFeatureStore: Send + Sync {
    /// Fetches features for the given tracks.
    ///
    /// Unknown ids are simply missing from the result; that is not an error.
    async fn get_features(&self, track_ids: &[String]) -> AppResult<Vec<AudioFeatureVector>>;
}

/// Pool of tracks that can be recommended
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CandidateTrackStore: Send + Sync {
    /// Returns up to `limit` tracks with features whose id is not in `exclude_track_ids`.
    ///
    /// Rows may lack metadata; joining and filtering is the caller's job.
    async fn get_candidates(
        &self,
        exclude_track_ids: &HashSet<String>,
        limit: usize,
    ) -> AppResult<Vec<CandidateRow>>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
