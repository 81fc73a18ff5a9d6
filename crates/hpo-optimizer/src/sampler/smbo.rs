//! Sequential model-based search around the incumbent.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;

use hpo_types::Direction;

use super::random::sample_uniform;
use super::{seeded_rng, Sampler, SearchSpace};
use crate::distribution::{Distribution, ParamValue};
use crate::trial::FrozenTrial;

/// Sequential model-based optimization with a best-point surrogate.
///
/// Observed trials are used to bias sampling toward the best configuration
/// seen so far: with probability `exploration_weight` (or when nothing has
/// completed yet) the whole space is sampled uniformly, otherwise the best
/// trial is perturbed locally.
pub struct SmboSampler {
    exploration_weight: f64,
    rng: Mutex<StdRng>,
}

impl SmboSampler {
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_exploration_weight(seed, 0.3)
    }

    pub fn with_exploration_weight(seed: Option<u64>, exploration_weight: f64) -> Self {
        Self {
            exploration_weight: exploration_weight.clamp(0.0, 1.0),
            rng: Mutex::new(seeded_rng(seed)),
        }
    }

    /// Perturb one parameter of the incumbent, staying on the grid.
    fn exploit(dist: &Distribution, base: Option<&ParamValue>, rng: &mut StdRng) -> ParamValue {
        let Some(index) = base.and_then(|value| dist.index_of(value)) else {
            // Fall back to random for missing base
            return sample_uniform(dist, rng);
        };

        let delta = match dist {
            Distribution::Float { .. } => {
                let spread = (dist.max_index() as f64 * 0.1).max(1.0);
                rng.random_range(-spread..=spread).round() as i64
            }
            Distribution::Int { .. } => rng.random_range(-2..=2),
            Distribution::Categorical { .. } => return sample_uniform(dist, rng),
        };
        dist.value_at(index.saturating_add(delta))
    }
}

impl Sampler for SmboSampler {
    fn sample_relative(
        &self,
        search_space: &SearchSpace,
        direction: Direction,
        history: &[FrozenTrial],
    ) -> BTreeMap<String, ParamValue> {
        let best = history
            .iter()
            .filter_map(|trial| trial.loss(direction).map(|loss| (loss, trial)))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.number.cmp(&b.1.number)));

        let Some((_, best)) = best else {
            return BTreeMap::new();
        };

        let mut rng = self.rng.lock();
        if rng.random::<f64>() < self.exploration_weight {
            return BTreeMap::new();
        }

        search_space
            .iter()
            .map(|(name, dist)| {
                let value = Self::exploit(dist, best.params.get(name), &mut rng);
                (name.clone(), value)
            })
            .collect()
    }

    fn sample_independent(
        &self,
        _name: &str,
        distribution: &Distribution,
        _direction: Direction,
        _history: &[FrozenTrial],
    ) -> ParamValue {
        let mut rng = self.rng.lock();
        sample_uniform(distribution, &mut *rng)
    }

    fn name(&self) -> &str {
        "smbo"
    }
}
