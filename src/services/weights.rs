use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::models::AudioFeature;

pub const MIN_WEIGHT: f64 = 0.01;
pub const MAX_WEIGHT: f64 = 0.5;
/// Weight change per unit of feedback signal
pub const ADAPTATION_RATE: f64 = 0.01;

/// Starting importances, in `AudioFeature::ALL` order. Tempo sits low because
/// it is the only unbounded feature. Renormalized on construction.
const DEFAULT_WEIGHTS: [f64; AudioFeature::COUNT] =
    [0.20, 0.20, 0.15, 0.15, 0.10, 0.05, 0.05, 0.08];

/// Per-feature importance used by both scorers.
///
/// Invariant: every weight is in `[MIN_WEIGHT, MAX_WEIGHT]` and the weights sum to 1.
/// Values are immutable once built; adaptation produces a new vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityWeights {
    values: [f64; AudioFeature::COUNT],
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            values: rebalance(DEFAULT_WEIGHTS),
        }
    }
}

impl SimilarityWeights {
    pub fn get(&self, feature: AudioFeature) -> f64 {
        self.values[feature.index()]
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Weights keyed by feature name, for display
    pub fn as_map(&self) -> BTreeMap<&'static str, f64> {
        AudioFeature::ALL
            .into_iter()
            .map(|feature| (feature.as_str(), self.get(feature)))
            .collect()
    }

    /// Applies one round of feedback and returns the adapted weights.
    ///
    /// Each known feature moves by `signal * ADAPTATION_RATE` and is clamped;
    /// then the whole vector is renormalized. Names must match exactly, so
    /// `"Energy"` is an unknown feature. Unknown names and non-finite signals
    /// are skipped; feedback with nothing applicable returns the weights unchanged.
    pub fn adjusted(&self, feedback: &HashMap<String, f64>) -> SimilarityWeights {
        let mut values = self.values;
        let mut applied = 0usize;

        for (name, signal) in feedback {
            let Some(feature) = AudioFeature::from_name(name) else {
                tracing::debug!(feature = %name, "Ignoring feedback for unknown feature");
                continue;
            };

            if !signal.is_finite() {
                tracing::debug!(feature = %name, "Ignoring non-finite feedback signal");
                continue;
            }

            let slot = &mut values[feature.index()];
            *slot = (*slot + signal * ADAPTATION_RATE).clamp(MIN_WEIGHT, MAX_WEIGHT);
            applied += 1;
        }

        if applied == 0 {
            return self.clone();
        }

        SimilarityWeights {
            values: rebalance(values),
        }
    }
}

/// Scales the vector to sum to 1 while keeping every entry in bounds.
///
/// Plain division by the sum is tried first. Entries it would push out of
/// bounds are pinned at the bound and the remainder is spread over the rest.
fn rebalance(mut values: [f64; AudioFeature::COUNT]) -> [f64; AudioFeature::COUNT] {
    for value in values.iter_mut() {
        *value = value.clamp(MIN_WEIGHT, MAX_WEIGHT);
    }

    let mut pinned = [false; AudioFeature::COUNT];

    loop {
        let (mut pinned_sum, mut free_sum) = (0.0, 0.0);
        for (value, is_pinned) in values.iter().zip(pinned.iter()) {
            if *is_pinned {
                pinned_sum += value;
            } else {
                free_sum += value;
            }
        }

        if free_sum <= 0.0 {
            return values;
        }

        let scale = (1.0 - pinned_sum) / free_sum;
        let mut pinned_any = false;

        for (value, is_pinned) in values.iter_mut().zip(pinned.iter_mut()) {
            if *is_pinned {
                continue;
            }
            let scaled = *value * scale;
            if scaled > MAX_WEIGHT {
                *value = MAX_WEIGHT;
                *is_pinned = true;
                pinned_any = true;
            } else if scaled < MIN_WEIGHT {
                *value = MIN_WEIGHT;
                *is_pinned = true;
                pinned_any = true;
            }
        }

        if !pinned_any {
            for (value, is_pinned) in values.iter_mut().zip(pinned.iter()) {
                if !*is_pinned {
                    *value *= scale;
                }
            }
            return values;
        }
    }
}

/// Holder of the weight vector the engine scores with.
///
/// Readers get a whole snapshot; writers replace the whole vector. A scoring
/// pass that took a snapshot never observes a later update.
pub trait WeightStore: Send + Sync {
    fn snapshot(&self) -> Arc<SimilarityWeights>;

    /// Atomically replaces the current weights with `update(current)`
    fn replace_with(
        &self,
        update: &dyn Fn(&SimilarityWeights) -> SimilarityWeights,
    ) -> Arc<SimilarityWeights>;
}

/// One weight vector shared by every user of an engine instance
#[derive(Debug, Default)]
pub struct SharedWeights {
    current: RwLock<Arc<SimilarityWeights>>,
}

impl SharedWeights {
    pub fn new(initial: SimilarityWeights) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }
}

impl WeightStore for SharedWeights {
    fn snapshot(&self) -> Arc<SimilarityWeights> {
        self.current.read().clone()
    }

    fn replace_with(
        &self,
        update: &dyn Fn(&SimilarityWeights) -> SimilarityWeights,
    ) -> Arc<SimilarityWeights> {
        let mut guard = self.current.write();
        let next = Arc::new(update(&**guard));
        *guard = next.clone();
        next
    }
}

/// Moves feature importance in response to user feedback
#[derive(Clone)]
pub struct WeightAdapter {
    store: Arc<dyn WeightStore>,
}

impl WeightAdapter {
    pub fn new(store: Arc<dyn WeightStore>) -> Self {
        Self { store }
    }

    /// Applies a feedback map to the shared weights.
    ///
    /// Not idempotent: replaying the same feedback moves the weights again.
    pub fn update_weights(&self, feedback: &HashMap<String, f64>) {
        let updated = self.store.replace_with(&|current| current.adjusted(feedback));

        tracing::info!(
            signals = feedback.len(),
            weights = ?updated.as_map(),
            "Similarity weights updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn assert_invariant(weights: &SimilarityWeights) {
        assert!(
            (weights.sum() - 1.0).abs() < 1e-9,
            "weights sum to {}",
            weights.sum()
        );
        for feature in AudioFeature::ALL {
            let w = weights.get(feature);
            assert!(
                (MIN_WEIGHT - 1e-12..=MAX_WEIGHT + 1e-12).contains(&w),
                "{feature} weight {w} out of bounds"
            );
        }
    }

    #[test]
    fn test_defaults_are_normalized() {
        let weights = SimilarityWeights::default();
        assert_invariant(&weights);
        // Relative order of the defaults survives normalization
        assert_eq!(
            weights.get(AudioFeature::Danceability),
            weights.get(AudioFeature::Energy)
        );
        assert!(weights.get(AudioFeature::Tempo) < weights.get(AudioFeature::Instrumentalness));
        assert!((weights.get(AudioFeature::Energy) - 0.20 / 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_positive_signal_raises_weight() {
        let before = SimilarityWeights::default();
        let after = before.adjusted(&feedback(&[("energy", 1.0)]));
        assert!(after.get(AudioFeature::Energy) > before.get(AudioFeature::Energy));
        assert!(after.get(AudioFeature::Valence) < before.get(AudioFeature::Valence));
        assert_invariant(&after);
    }

    #[test]
    fn test_negative_signal_lowers_weight() {
        let before = SimilarityWeights::default();
        let after = before.adjusted(&feedback(&[("danceability", -3.0)]));
        assert!(after.get(AudioFeature::Danceability) < before.get(AudioFeature::Danceability));
        assert_invariant(&after);
    }

    #[test]
    fn test_unknown_features_are_ignored() {
        let before = SimilarityWeights::default();
        let after = before.adjusted(&feedback(&[("loudness", 5.0), ("groove", -2.0)]));
        assert_eq!(before, after);
    }

    #[test]
    fn test_non_finite_signal_is_ignored() {
        let before = SimilarityWeights::default();
        let after = before.adjusted(&feedback(&[("energy", f64::NAN)]));
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_feedback_leaves_weights_bit_identical() {
        let before = SimilarityWeights::default().adjusted(&feedback(&[("energy", 4.0)]));
        assert_eq!(before.adjusted(&HashMap::new()), before);
        assert_eq!(before.adjusted(&feedback(&[("groove", 1.0)])), before);
    }

    #[test]
    fn test_feature_names_match_exactly() {
        let before = SimilarityWeights::default();
        let once = before.adjusted(&feedback(&[("energy", 1.0)]));
        let with_variant = before.adjusted(&feedback(&[("energy", 1.0), ("Energy", 1.0)]));
        assert_eq!(once, with_variant);
        assert_eq!(before.adjusted(&feedback(&[("ENERGY", 3.0)])), before);
    }

    #[test]
    fn test_repeated_positive_feedback_climbs_to_ceiling() {
        let mut weights = SimilarityWeights::default();
        let signal = feedback(&[("energy", 1.0)]);

        for _ in 0..2000 {
            let next = weights.adjusted(&signal);
            assert!(next.get(AudioFeature::Energy) >= weights.get(AudioFeature::Energy) - 1e-12);
            assert!(next.get(AudioFeature::Energy) <= MAX_WEIGHT);
            assert_invariant(&next);
            weights = next;
        }

        assert!(weights.get(AudioFeature::Energy) > MAX_WEIGHT - 1e-3);
    }

    #[test]
    fn test_invariant_holds_under_mixed_feedback() {
        let mut weights = SimilarityWeights::default();
        // Deterministic pseudo-random walk over features and signals
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let feature = AudioFeature::ALL[(seed % AudioFeature::COUNT as u64) as usize];
            let signal = ((seed >> 8) % 2001) as f64 / 100.0 - 10.0;
            weights = weights.adjusted(&feedback(&[(feature.as_str(), signal)]));
            assert_invariant(&weights);
        }
    }

    #[test]
    fn test_large_negative_signals_pin_at_floor() {
        let weights = SimilarityWeights::default().adjusted(&feedback(&[
            ("danceability", -100.0),
            ("energy", -100.0),
            ("valence", -100.0),
            ("acousticness", -100.0),
            ("instrumentalness", -100.0),
            ("speechiness", -100.0),
        ]));
        assert_invariant(&weights);
        assert_eq!(
            weights.get(AudioFeature::Energy),
            weights.get(AudioFeature::Valence)
        );
        assert!(weights.get(AudioFeature::Tempo) > weights.get(AudioFeature::Energy));
    }

    #[test]
    fn test_shared_weights_swap_whole_snapshot() {
        let store = SharedWeights::default();
        let before = store.snapshot();

        store.replace_with(&|current| current.adjusted(&feedback(&[("energy", 2.0)])));
        let after = store.snapshot();

        // The snapshot held by an in-flight reader is untouched
        assert_eq!(*before, SimilarityWeights::default());
        assert!(after.get(AudioFeature::Energy) > before.get(AudioFeature::Energy));
    }

    #[test]
    fn test_concurrent_updates_keep_invariant() {
        let store: Arc<dyn WeightStore> = Arc::new(SharedWeights::default());
        let adapter = WeightAdapter::new(store.clone());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let adapter = adapter.clone();
                let store = store.clone();
                std::thread::spawn(move || {
                    let feature = AudioFeature::ALL[i % AudioFeature::COUNT];
                    for _ in 0..100 {
                        adapter.update_weights(&feedback(&[(feature.as_str(), 1.0)]));
                        assert_invariant(&store.snapshot());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_invariant(&store.snapshot());
    }
}
