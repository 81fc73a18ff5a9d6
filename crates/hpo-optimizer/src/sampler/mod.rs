//! Sampler trait and the built-in sampling strategies.

mod parzen;
mod random;
mod smbo;
mod tpe;

pub use random::RandomSampler;
pub use smbo::SmboSampler;
pub use tpe::TpeSampler;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

use hpo_types::{Direction, HpoAlgoImpl};

use crate::distribution::{Distribution, ParamValue};
use crate::trial::FrozenTrial;

/// Parameter name to distribution, ordered by name so sampling order is stable.
pub type SearchSpace = BTreeMap<String, Distribution>;

/// Pluggable strategy that proposes parameter values given the trial history.
///
/// `history` always holds completed trials only; pruned and failed trials never
/// reach a sampler.
pub trait Sampler: Send + Sync {
    /// Jointly sample the parameters of `search_space` before a trial starts.
    ///
    /// Parameters left out of the returned map fall back to
    /// [`Sampler::sample_independent`].
    fn sample_relative(
        &self,
        _search_space: &SearchSpace,
        _direction: Direction,
        _history: &[FrozenTrial],
    ) -> BTreeMap<String, ParamValue> {
        BTreeMap::new()
    }

    /// Sample a single parameter.
    fn sample_independent(
        &self,
        name: &str,
        distribution: &Distribution,
        direction: Direction,
        history: &[FrozenTrial],
    ) -> ParamValue;

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Build the sampler for an algorithm name.
pub fn create_sampler(algo: HpoAlgoImpl, seed: Option<u64>) -> Box<dyn Sampler> {
    match algo {
        HpoAlgoImpl::OptunaTpe => Box::new(TpeSampler::new(seed)),
        HpoAlgoImpl::OptunaTpeMultivariate => Box::new(TpeSampler::multivariate(seed)),
        HpoAlgoImpl::OptunaSkopt => Box::new(SmboSampler::new(seed)),
    }
}

/// Parameters sampled with the same distribution in every completed trial.
pub fn intersection_search_space(history: &[FrozenTrial]) -> SearchSpace {
    let mut trials = history.iter();
    let Some(first) = trials.next() else {
        return SearchSpace::new();
    };

    let mut space = first.distributions.clone();
    for trial in trials {
        space.retain(|name, dist| trial.distributions.get(name) == Some(dist));
    }
    space
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::completed;
    use super::*;
    use serde_json::json;

    #[test]
    fn create_sampler_maps_every_algorithm() {
        assert_eq!(create_sampler(HpoAlgoImpl::OptunaTpe, Some(1)).name(), "tpe");
        assert_eq!(
            create_sampler(HpoAlgoImpl::OptunaTpeMultivariate, Some(1)).name(),
            "tpe_multivariate"
        );
        assert_eq!(create_sampler(HpoAlgoImpl::OptunaSkopt, Some(1)).name(), "smbo");
    }

    #[test]
    fn intersection_keeps_shared_distributions() {
        let x = Distribution::int(0, 10, 1).unwrap();
        let y = Distribution::categorical(vec![json!("a"), json!("b")]).unwrap();
        let y_other = Distribution::categorical(vec![json!("a")]).unwrap();

        let history = vec![
            completed(
                0,
                vec![
                    ("x", x.clone(), ParamValue::Int(1)),
                    ("y", y.clone(), ParamValue::Categorical(0)),
                ],
                1.0,
            ),
            completed(
                1,
                vec![
                    ("x", x.clone(), ParamValue::Int(2)),
                    ("y", y_other, ParamValue::Categorical(0)),
                ],
                2.0,
            ),
        ];

        let space = intersection_search_space(&history);
        assert_eq!(space.len(), 1);
        assert_eq!(space.get("x"), Some(&x));
        assert!(intersection_search_space(&[]).is_empty());
    }
}
