use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::{Cache, CacheKey},
    error::AppResult,
    models::AudioFeatureVector,
    services::providers::AudioFeatureStore,
};

/// Read-through Redis cache in front of another feature store.
///
/// Feature vectors are immutable once computed, so entries only expire by TTL.
/// Unknown tracks are not cached. A Redis outage degrades to the inner store.
pub struct CachedFeatureStore {
    inner: Arc<dyn AudioFeatureStore>,
    cache: Cache,
    ttl: u64,
}

impl CachedFeatureStore {
    pub fn new(inner: Arc<dyn AudioFeatureStore>, cache: Cache, ttl: u64) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait::async_trait]
impl AudioFeatureStore for CachedFeatureStore {
    async fn get_features(&self, track_ids: &[String]) -> AppResult<Vec<AudioFeatureVector>> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = track_ids.iter().filter(|id| seen.insert(*id)).collect();
        let keys: Vec<CacheKey> = unique
            .iter()
            .map(|id| CacheKey::AudioFeatures((*id).clone()))
            .collect();

        let cached: Vec<Option<AudioFeatureVector>> = match self.cache.get_many(&keys).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "Feature cache unavailable, reading through");
                vec![None; keys.len()]
            }
        };

        let mut found = Vec::with_capacity(unique.len());
        let mut misses = Vec::new();
        for (id, hit) in unique.into_iter().zip(cached) {
            match hit {
                Some(vector) => found.push(vector),
                None => misses.push(id.clone()),
            }
        }

        tracing::debug!(hits = found.len(), misses = misses.len(), "Feature cache lookup");

        if misses.is_empty() {
            return Ok(found);
        }

        let fetched = self.inner.get_features(&misses).await?;
        for vector in &fetched {
            self.cache.set_in_background(
                &CacheKey::AudioFeatures(vector.track_id.clone()),
                vector,
                self.ttl,
            );
        }

        found.extend(fetched);
        Ok(found)
    }
}
