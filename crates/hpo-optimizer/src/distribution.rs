//! Parameter distributions and sampled parameter values.
//!
//! Every distribution here is a finite grid: stepped reals, stepped integers
//! and categorical choices are all addressed by a grid index `0..=max_index`.
//! Samplers work on indices and never produce off-grid values.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hpo_types::{validation_error, HpoResult, Tunable, TunableDomain, TunableValue};

/// A parameter value as stored on a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    /// Index into the categorical choices.
    Categorical(usize),
}

/// Describes where a parameter is sampled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// Discrete uniform over `low + k * step`, `k = 0..=floor((high - low) / step)`.
    Float { low: f64, high: f64, step: f64 },
    /// Integers `low + k * step` up to `high`.
    Int { low: i64, high: i64, step: i64 },
    /// One of `choices`.
    Categorical { choices: Vec<serde_json::Value> },
}

impl Distribution {
    pub fn float(low: f64, high: f64, step: f64) -> HpoResult<Self> {
        if !(low.is_finite() && high.is_finite() && step.is_finite()) {
            return Err(validation_error!("float distribution requires finite bounds and step"));
        }
        if low > high {
            return Err(validation_error!("low ({low}) must not exceed high ({high})"));
        }
        if step <= 0.0 {
            return Err(validation_error!("step must be positive, got {step}"));
        }
        Ok(Self::Float { low, high, step })
    }

    pub fn int(low: i64, high: i64, step: i64) -> HpoResult<Self> {
        if low > high {
            return Err(validation_error!("low ({low}) must not exceed high ({high})"));
        }
        if step <= 0 {
            return Err(validation_error!("step must be positive, got {step}"));
        }
        if high.checked_sub(low).is_none() {
            return Err(validation_error!("range {low}..={high} is wider than an i64"));
        }
        Ok(Self::Int { low, high, step })
    }

    pub fn categorical(choices: Vec<serde_json::Value>) -> HpoResult<Self> {
        if choices.is_empty() {
            return Err(validation_error!("categorical choices cannot be empty"));
        }
        Ok(Self::Categorical { choices })
    }

    /// The distribution a tunable declares.
    pub fn from_tunable(tunable: &Tunable) -> HpoResult<Self> {
        match &tunable.domain {
            TunableDomain::Double {
                lower_bound,
                upper_bound,
                step,
            } => Self::float(*lower_bound, *upper_bound, *step),
            TunableDomain::Integer {
                lower_bound,
                upper_bound,
                step,
            } => Self::int(*lower_bound, *upper_bound, *step),
            TunableDomain::Categorical { choices } => Self::categorical(choices.clone()),
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical { .. })
    }

    /// Largest valid grid index. Zero means the distribution holds one value.
    pub fn max_index(&self) -> i64 {
        match self {
            // Tolerance keeps e.g. (2.0 - 0.5) / 0.1 = 14.999999999999998 on 15.
            Self::Float { low, high, step } => ((high - low) / step + 1e-9).floor() as i64,
            Self::Int { low, high, step } => high.saturating_sub(*low) / step,
            Self::Categorical { choices } => choices.len() as i64 - 1,
        }
    }

    /// Value at grid index `index`, clamped to the grid.
    pub fn value_at(&self, index: i64) -> ParamValue {
        let index = index.clamp(0, self.max_index());
        match self {
            Self::Float { low, step, high } => {
                ParamValue::Float(stepped_float(*low, *step, index).min(*high))
            }
            Self::Int { low, step, .. } => ParamValue::Int(low + index * step),
            Self::Categorical { .. } => ParamValue::Categorical(index as usize),
        }
    }

    /// Grid index of `value`, or `None` when it does not belong to this distribution.
    pub fn index_of(&self, value: &ParamValue) -> Option<i64> {
        match (self, value) {
            (Self::Float { low, step, .. }, ParamValue::Float(v)) => {
                let k = ((v - low) / step).round();
                let on_grid = (low + k * step - v).abs() <= step * 1e-6;
                (on_grid && k >= 0.0 && (k as i64) <= self.max_index()).then_some(k as i64)
            }
            (Self::Int { low, step, .. }, ParamValue::Int(v)) => {
                let offset = v.checked_sub(*low)?;
                (offset >= 0 && offset % step == 0 && offset / step <= self.max_index())
                    .then_some(offset / step)
            }
            (Self::Categorical { choices }, ParamValue::Categorical(i)) => {
                (*i < choices.len()).then_some(*i as i64)
            }
            _ => None,
        }
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        self.index_of(value).is_some()
    }

    /// Position of `value` on the unit interval, used by the density models.
    pub(crate) fn to_unit(&self, value: &ParamValue) -> Option<f64> {
        let index = self.index_of(value)?;
        let max = self.max_index();
        Some(if max == 0 { 0.0 } else { index as f64 / max as f64 })
    }

    /// Nearest grid value to a point on the unit interval.
    pub(crate) fn from_unit(&self, unit: f64) -> ParamValue {
        let max = self.max_index();
        self.value_at((unit.clamp(0.0, 1.0) * max as f64).round() as i64)
    }

    /// Converts a stored value into the user-facing tunable value.
    pub fn to_tunable_value(&self, value: &ParamValue) -> Option<TunableValue> {
        match (self, value) {
            (Self::Float { .. }, ParamValue::Float(v)) => Some(TunableValue::Double(*v)),
            (Self::Int { .. }, ParamValue::Int(v)) => Some(TunableValue::Integer(*v)),
            (Self::Categorical { choices }, ParamValue::Categorical(i)) => {
                choices.get(*i).cloned().map(TunableValue::Categorical)
            }
            _ => None,
        }
    }
}

/// `low + index * step` computed in decimal so grid points print cleanly
/// (0.8 rather than 0.8000000000000002).
fn stepped_float(low: f64, step: f64, index: i64) -> f64 {
    let exact = low + index as f64 * step;
    match (Decimal::try_from(low), Decimal::try_from(step)) {
        (Ok(low), Ok(step)) => low
            .checked_add(step.checked_mul(Decimal::from(index)).unwrap_or(Decimal::MAX))
            .and_then(|v| v.to_f64())
            .unwrap_or(exact),
        _ => exact,
    }
}
