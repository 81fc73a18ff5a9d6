//! Independent uniform sampling over the parameter grid.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;

use hpo_types::Direction;

use super::{seeded_rng, Sampler};
use crate::distribution::{Distribution, ParamValue};
use crate::trial::FrozenTrial;

/// Ignores the history and draws every grid point with equal probability.
///
/// Also used by the other samplers during their startup phase.
pub struct RandomSampler {
    rng: Mutex<StdRng>,
}

impl RandomSampler {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Mutex::new(seeded_rng(seed)),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Sampler for RandomSampler {
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
        "random"
    }
}

pub(crate) fn sample_uniform<R: Rng>(distribution: &Distribution, rng: &mut R) -> ParamValue {
    let index = rng.random_range(0..=distribution.max_index());
    distribution.value_at(index)
}
