//! Trial suggestion interface and finished-trial records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use hpo_types::{Direction, HpoError, HpoResult, TunableValue};

use crate::distribution::{Distribution, ParamValue};
use crate::sampler::{Sampler, SearchSpace};

/// Terminal state of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// Scored; feeds the samplers and best-trial selection.
    Complete,
    /// Abandoned by the objective; never scored.
    Pruned,
    /// The objective errored or produced a non-finite value.
    Failed,
}

/// A finished trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenTrial {
    pub number: usize,
    pub state: TrialState,
    pub value: Option<f64>,
    pub params: BTreeMap<String, ParamValue>,
    pub distributions: BTreeMap<String, Distribution>,
    pub datetime_start: DateTime<Utc>,
    pub datetime_complete: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl FrozenTrial {
    pub fn is_complete(&self) -> bool {
        self.state == TrialState::Complete
    }

    /// Value mapped so that lower is better; `None` unless the trial completed.
    pub fn loss(&self, direction: Direction) -> Option<f64> {
        match (self.state, self.value) {
            (TrialState::Complete, Some(value)) => Some(direction.to_loss(value)),
            _ => None,
        }
    }

    /// The user-facing value of parameter `name`.
    pub fn tunable_value(&self, name: &str) -> Option<TunableValue> {
        let dist = self.distributions.get(name)?;
        dist.to_tunable_value(self.params.get(name)?)
    }

    /// All parameters as user-facing values.
    pub fn tunable_params(&self) -> BTreeMap<String, TunableValue> {
        self.params
            .keys()
            .filter_map(|name| Some((name.clone(), self.tunable_value(name)?)))
            .collect()
    }
}

/// A running trial: hands out parameter values to the objective.
///
/// Relative (joint) samples are drawn once when the trial is created; any
/// parameter they do not cover is sampled independently on first request.
/// Asking for the same name twice returns the first value, provided the
/// distribution is unchanged.
pub struct Trial<'a> {
    number: usize,
    direction: Direction,
    sampler: &'a dyn Sampler,
    history: Vec<FrozenTrial>,
    relative_space: SearchSpace,
    relative_params: BTreeMap<String, ParamValue>,
    params: BTreeMap<String, ParamValue>,
    distributions: BTreeMap<String, Distribution>,
    datetime_start: DateTime<Utc>,
}

impl<'a> Trial<'a> {
    pub(crate) fn new(
        number: usize,
        direction: Direction,
        sampler: &'a dyn Sampler,
        history: Vec<FrozenTrial>,
        relative_space: SearchSpace,
        relative_params: BTreeMap<String, ParamValue>,
    ) -> Self {
        Self {
            number,
            direction,
            sampler,
            history,
            relative_space,
            relative_params,
            params: BTreeMap::new(),
            distributions: BTreeMap::new(),
            datetime_start: Utc::now(),
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// A real value from `low + k * step`, within `[low, high]`.
    pub fn suggest_discrete_uniform(
        &mut self,
        name: &str,
        low: f64,
        high: f64,
        step: f64,
    ) -> HpoResult<f64> {
        match self.suggest(name, Distribution::float(low, high, step)?)? {
            ParamValue::Float(v) => Ok(v),
            other => Err(mismatch(name, &other)),
        }
    }

    /// An integer from `low + k * step`, within `[low, high]`.
    pub fn suggest_int(&mut self, name: &str, low: i64, high: i64, step: i64) -> HpoResult<i64> {
        match self.suggest(name, Distribution::int(low, high, step)?)? {
            ParamValue::Int(v) => Ok(v),
            other => Err(mismatch(name, &other)),
        }
    }

    /// One of `choices`.
    pub fn suggest_categorical(
        &mut self,
        name: &str,
        choices: &[serde_json::Value],
    ) -> HpoResult<serde_json::Value> {
        let dist = Distribution::categorical(choices.to_vec())?;
        match self.suggest(name, dist)? {
            ParamValue::Categorical(i) => choices
                .get(i)
                .cloned()
                .ok_or_else(|| mismatch(name, &ParamValue::Categorical(i))),
            other => Err(mismatch(name, &other)),
        }
    }

    /// Sample (or recall) parameter `name` from `distribution`.
    pub fn suggest(&mut self, name: &str, distribution: Distribution) -> HpoResult<ParamValue> {
        if let Some(existing) = self.distributions.get(name) {
            if *existing != distribution {
                return Err(HpoError::ParameterConflict {
                    name: name.to_string(),
                    reason: format!("already suggested from {existing:?}, now {distribution:?}"),
                });
            }
            if let Some(value) = self.params.get(name) {
                return Ok(value.clone());
            }
        }

        let relative = self
            .relative_params
            .get(name)
            .filter(|value| {
                self.relative_space.get(name) == Some(&distribution) && distribution.contains(value)
            })
            .cloned();

        let value = match relative {
            Some(value) => value,
            None => self
                .sampler
                .sample_independent(name, &distribution, self.direction, &self.history),
        };

        self.params.insert(name.to_string(), value.clone());
        self.distributions.insert(name.to_string(), distribution);
        Ok(value)
    }

    pub(crate) fn finish(self, state: TrialState, value: Option<f64>, error: Option<String>) -> FrozenTrial {
        FrozenTrial {
            number: self.number,
            state,
            value,
            params: self.params,
            distributions: self.distributions,
            datetime_start: self.datetime_start,
            datetime_complete: Some(Utc::now()),
            error,
        }
    }
}

fn mismatch(name: &str, value: &ParamValue) -> HpoError {
    HpoError::Internal(format!("sampler returned {value:?} for parameter '{name}'"))
}
