use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Candidate, CandidateRow},
    services::providers::CandidateTrackStore,
};

/// Fetches unheard tracks and joins them into recommendable candidates
#[derive(Clone)]
pub struct CandidateRetriever {
    store: Arc<dyn CandidateTrackStore>,
}

impl CandidateRetriever {
    pub fn new(store: Arc<dyn CandidateTrackStore>) -> Self {
        Self { store }
    }

    /// Returns up to `limit` candidates whose id is not excluded.
    ///
    /// Rows without metadata are dropped: a track nobody can name is not worth
    /// recommending.
    pub async fn get_candidates(
        &self,
        exclude_track_ids: &HashSet<String>,
        limit: usize,
    ) -> AppResult<Vec<Candidate>> {
        let rows = self.store.get_candidates(exclude_track_ids, limit).await?;
        let fetched = rows.len();
        let candidates = join_rows(rows, exclude_track_ids, limit);

        tracing::debug!(
            store = self.store.name(),
            fetched,
            kept = candidates.len(),
            excluded = exclude_track_ids.len(),
            "Retrieved candidate pool"
        );

        Ok(candidates)
    }
}

/// Pairs features with metadata, dropping anything excluded, unnamed or repeated
fn join_rows(
    rows: Vec<CandidateRow>,
    exclude_track_ids: &HashSet<String>,
    limit: usize,
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut without_metadata = 0usize;

    let candidates: Vec<Candidate> = rows
        .into_iter()
        .filter(|row| !exclude_track_ids.contains(&row.features.track_id))
        .filter_map(|row| match row.metadata {
            Some(track) if track.track_id == row.features.track_id => Some(Candidate {
                track,
                features: row.features.features,
            }),
            Some(track) => {
                tracing::warn!(
                    features_id = %row.features.track_id,
                    metadata_id = %track.track_id,
                    "Candidate metadata does not match its features, dropping"
                );
                None
            }
            None => {
                without_metadata += 1;
                None
            }
        })
        .filter(|candidate| seen.insert(candidate.track.track_id.clone()))
        .take(limit)
        .collect();

    if without_metadata > 0 {
        tracing::debug!(dropped = without_metadata, "Dropped candidates without metadata");
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{AudioFeatureVector, AudioFeatures, TrackRecord};
    use crate::services::providers::MockCandidateTrackStore;
    use std::collections::BTreeSet;

    fn row(id: &str, named: bool) -> CandidateRow {
        CandidateRow {
            features: AudioFeatureVector::new(id, AudioFeatures::neutral()),
            metadata: named.then(|| TrackRecord {
                track_id: id.to_string(),
                name: format!("Song {}", id),
                artists: vec!["Someone".to_string()],
                genres: BTreeSet::new(),
            }),
        }
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.track_id()).collect()
    }

    #[test]
    fn test_rows_without_metadata_are_dropped() {
        let rows = vec![row("a", true), row("b", false), row("c", true)];
        let joined = join_rows(rows, &HashSet::new(), 10);
        assert_eq!(ids(&joined), vec!["a", "c"]);
    }

    #[test]
    fn test_excluded_and_duplicate_rows_are_dropped() {
        let exclude: HashSet<String> = ["b".to_string()].into_iter().collect();
        let rows = vec![row("a", true), row("b", true), row("a", true), row("c", true)];
        let joined = join_rows(rows, &exclude, 10);
        assert_eq!(ids(&joined), vec!["a", "c"]);
    }

    #[test]
    fn test_mismatched_metadata_is_dropped() {
        let mut bad = row("a", true);
        if let Some(track) = bad.metadata.as_mut() {
            track.track_id = "other".to_string();
        }
        let joined = join_rows(vec![bad, row("b", true)], &HashSet::new(), 10);
        assert_eq!(ids(&joined), vec!["b"]);
    }

    #[test]
    fn test_limit_applies_after_filtering() {
        let rows = vec![row("a", false), row("b", true), row("c", true), row("d", true)];
        let joined = join_rows(rows, &HashSet::new(), 2);
        assert_eq!(ids(&joined), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_retriever_passes_exclusions_and_limit_to_store() {
        let mut store = MockCandidateTrackStore::new();
        store
            .expect_get_candidates()
            .withf(|exclude: &HashSet<String>, limit: &usize| {
                exclude.contains("heard") && *limit == 5000
            })
            .times(1)
            .returning(|_, _| Ok(vec![row("fresh", true)]));
        store.expect_name().return_const("mock");

        let retriever = CandidateRetriever::new(Arc::new(store));
        let exclude: HashSet<String> = ["heard".to_string()].into_iter().collect();
        let candidates = retriever.get_candidates(&exclude, 5000).await.unwrap();
        assert_eq!(ids(&candidates), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_retriever_propagates_store_errors() {
        let mut store = MockCandidateTrackStore::new();
        store
            .expect_get_candidates()
            .returning(|_, _| Err(AppError::Internal("connection reset".to_string())));
        store.expect_name().return_const("mock");

        let retriever = CandidateRetriever::new(Arc::new(store));
        assert!(retriever.get_candidates(&HashSet::new(), 10).await.is_err());
    }
}
