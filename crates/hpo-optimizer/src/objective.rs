//! Objective adapter: turns a tunable list into one trial evaluation.

use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use hpo_types::{
    ExperimentRunner, ExperimentStatus, ExperimentTunable, TrialError, TrialRecord, Tunable,
    TunableDomain, TunableValue,
};

use crate::trial::Trial;

/// Collects one [`TrialRecord`] per evaluated trial.
///
/// Scoped to a single recommendation run. Records arrive from whichever worker
/// ran the trial, so their order is not meaningful under parallelism.
#[derive(Debug, Default)]
pub struct TrialHistory {
    records: Mutex<Vec<TrialRecord>>,
}

impl TrialHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: TrialRecord) {
        self.records.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<TrialRecord> {
        self.records.lock().clone()
    }

    pub fn into_records(self) -> Vec<TrialRecord> {
        self.records.into_inner()
    }
}

/// Samples every tunable, runs the experiment and scores the trial.
pub struct TunableObjective<'a, R: ?Sized> {
    tunables: &'a [Tunable],
    runner: &'a R,
    history: &'a TrialHistory,
}

impl<'a, R: ExperimentRunner + ?Sized> TunableObjective<'a, R> {
    pub fn new(tunables: &'a [Tunable], runner: &'a R, history: &'a TrialHistory) -> Self {
        Self {
            tunables,
            runner,
            history,
        }
    }

    /// Evaluate one trial.
    ///
    /// Returns the objective value rounded to two decimals, or
    /// [`TrialError::Pruned`] when the experiment asked for the trial to be
    /// discarded. A record is kept whatever the experiment reported.
    pub fn evaluate(&self, trial: &mut Trial<'_>) -> Result<f64, TrialError> {
        let mut experiment_tunables = Vec::with_capacity(self.tunables.len());

        for tunable in self.tunables {
            let value = match &tunable.domain {
                TunableDomain::Double {
                    lower_bound,
                    upper_bound,
                    step,
                } => TunableValue::Double(trial.suggest_discrete_uniform(
                    &tunable.name,
                    *lower_bound,
                    *upper_bound,
                    *step,
                )?),
                TunableDomain::Integer {
                    lower_bound,
                    upper_bound,
                    step,
                } => TunableValue::Integer(trial.suggest_int(
                    &tunable.name,
                    *lower_bound,
                    *upper_bound,
                    *step,
                )?),
                TunableDomain::Categorical { choices } => {
                    TunableValue::Categorical(trial.suggest_categorical(&tunable.name, choices)?)
                }
            };
            experiment_tunables.push(ExperimentTunable::new(tunable.name.clone(), value));
        }

        debug!("Experiment tunables: {:?}", experiment_tunables);

        let outcome = match self.runner.perform_experiment(&experiment_tunables) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.history.record(TrialRecord {
                    experiment_tunables,
                    experiment_status: ExperimentStatus::Failure,
                });
                return Err(TrialError::Failed(e.to_string()));
            }
        };

        self.history.record(TrialRecord {
            experiment_tunables,
            experiment_status: outcome.status,
        });

        if outcome.status == ExperimentStatus::Prune {
            return Err(TrialError::Pruned);
        }

        Ok(round_objective(outcome.objective_value))
    }
}

/// Round to two decimal places, half to even, on the exact binary value.
///
/// `2.675` is stored as `2.67499999...` and so rounds to `2.67`. Values
/// outside the decimal range (including NaN and infinities) are returned
/// unchanged.
pub fn round_objective(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .and_then(|d| d.round_dp(2).to_f64())
        .unwrap_or(value)
}
