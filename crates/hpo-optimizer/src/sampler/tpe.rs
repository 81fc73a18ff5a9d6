//! Tree-structured Parzen estimator sampler.
//!
//! Completed trials are split into a "good" group (the best `gamma(n)` trials)
//! and a "bad" group. A Parzen estimator is fitted to each; candidates are
//! drawn from the good estimator and the one maximizing `l(x) / g(x)` wins.
//! Until `n_startup_trials` trials have completed, sampling is uniform.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

use hpo_types::Direction;

use super::parzen::{Dimension, ParzenEstimator};
use super::random::sample_uniform;
use super::{seeded_rng, Sampler, SearchSpace};
use crate::distribution::{Distribution, ParamValue};
use crate::trial::FrozenTrial;

const DEFAULT_STARTUP_TRIALS: usize = 10;
const DEFAULT_EI_CANDIDATES: usize = 24;
const MAX_GOOD_TRIALS: usize = 25;

pub struct TpeSampler {
    multivariate: bool,
    n_startup_trials: usize,
    n_ei_candidates: usize,
    rng: Mutex<StdRng>,
}

impl TpeSampler {
    /// Univariate TPE: every parameter is modelled on its own.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            multivariate: false,
            n_startup_trials: DEFAULT_STARTUP_TRIALS,
            n_ei_candidates: DEFAULT_EI_CANDIDATES,
            rng: Mutex::new(seeded_rng(seed)),
        }
    }

    /// Multivariate TPE: the shared search space is modelled jointly.
    pub fn multivariate(seed: Option<u64>) -> Self {
        Self {
            multivariate: true,
            ..Self::new(seed)
        }
    }

    pub fn with_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_ei_candidates(mut self, n: usize) -> Self {
        self.n_ei_candidates = n.max(1);
        self
    }

    pub fn is_multivariate(&self) -> bool {
        self.multivariate
    }

    /// Jointly sample `dists` from the trials that observed all of them.
    ///
    /// Returns `None` while there are fewer than `n_startup_trials` usable
    /// observations.
    fn sample_joint(
        &self,
        dists: &[(&str, &Distribution)],
        direction: Direction,
        history: &[FrozenTrial],
        rng: &mut StdRng,
    ) -> Option<Vec<ParamValue>> {
        let mut observed: Vec<(f64, usize, Vec<f64>)> = history
            .iter()
            .filter_map(|trial| {
                let loss = trial.loss(direction)?;
                let coords = dists
                    .iter()
                    .map(|(name, dist)| {
                        if trial.distributions.get(*name) != Some(*dist) {
                            return None;
                        }
                        coordinate(dist, trial.params.get(*name)?)
                    })
                    .collect::<Option<Vec<f64>>>()?;
                Some((loss, trial.number, coords))
            })
            .collect();

        if observed.len() < self.n_startup_trials.max(2) {
            return None;
        }

        observed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let n_good = gamma(observed.len()).clamp(1, observed.len() - 1);
        let (good, bad): (Vec<_>, Vec<_>) = observed
            .into_iter()
            .enumerate()
            .map(|(rank, (_, _, coords))| (rank, coords))
            .partition(|(rank, _)| *rank < n_good);
        let good: Vec<Vec<f64>> = good.into_iter().map(|(_, c)| c).collect();
        let bad: Vec<Vec<f64>> = bad.into_iter().map(|(_, c)| c).collect();

        let dimensions: Vec<Dimension> = dists.iter().map(|(_, dist)| dimension(dist)).collect();
        let l = ParzenEstimator::fit(&dimensions, &good);
        let g = ParzenEstimator::fit(&dimensions, &bad);

        let mut best: Option<(f64, Vec<f64>)> = None;
        for _ in 0..self.n_ei_candidates {
            let candidate = l.sample(rng);
            let score = l.log_pdf(&candidate) - g.log_pdf(&candidate);
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, candidate));
            }
        }

        let (_, point) = best?;
        Some(
            dists
                .iter()
                .zip(point)
                .map(|((_, dist), x)| from_coordinate(dist, x))
                .collect(),
        )
    }
}

impl Sampler for TpeSampler {
    fn sample_relative(
        &self,
        search_space: &SearchSpace,
        direction: Direction,
        history: &[FrozenTrial],
    ) -> BTreeMap<String, ParamValue> {
        if !self.multivariate || search_space.is_empty() {
            return BTreeMap::new();
        }

        let dists: Vec<(&str, &Distribution)> = search_space
            .iter()
            .map(|(name, dist)| (name.as_str(), dist))
            .collect();
        let mut rng = self.rng.lock();
        match self.sample_joint(&dists, direction, history, &mut rng) {
            Some(values) => dists
                .iter()
                .zip(values)
                .map(|((name, _), value)| (name.to_string(), value))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    fn sample_independent(
        &self,
        name: &str,
        distribution: &Distribution,
        direction: Direction,
        history: &[FrozenTrial],
    ) -> ParamValue {
        let mut rng = self.rng.lock();
        self.sample_joint(&[(name, distribution)], direction, history, &mut rng)
            .and_then(|mut values| values.pop())
            .unwrap_or_else(|| sample_uniform(distribution, &mut *rng))
    }

    fn name(&self) -> &str {
        if self.multivariate {
            "tpe_multivariate"
        } else {
            "tpe"
        }
    }
}

/// Number of trials treated as "good": `min(ceil(0.1 * n), 25)`.
fn gamma(n: usize) -> usize {
    ((0.1 * n as f64).ceil() as usize).min(MAX_GOOD_TRIALS)
}

fn dimension(dist: &Distribution) -> Dimension {
    match dist {
        Distribution::Categorical { choices } => Dimension::Categorical {
            n_choices: choices.len(),
        },
        Distribution::Float { .. } | Distribution::Int { .. } => Dimension::Numeric {
            grid: dist.max_index(),
        },
    }
}

fn coordinate(dist: &Distribution, value: &ParamValue) -> Option<f64> {
    if dist.is_categorical() {
        dist.index_of(value).map(|i| i as f64)
    } else {
        dist.to_unit(value)
    }
}

fn from_coordinate(dist: &Distribution, x: f64) -> ParamValue {
    if dist.is_categorical() {
        dist.value_at(x.round() as i64)
    } else {
        dist.from_unit(x)
    }
}
