//! Experiment runner seam and per-trial records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::HpoResult;
use crate::tunable::TunableValue;

/// One `{tunable_name, tunable_value}` pair handed to the experiment runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentTunable {
    pub tunable_name: String,
    pub tunable_value: TunableValue,
}

impl ExperimentTunable {
    pub fn new(tunable_name: impl Into<String>, tunable_value: TunableValue) -> Self {
        Self {
            tunable_name: tunable_name.into(),
            tunable_value,
        }
    }
}

/// Status reported by the experiment runner.
///
/// Any status string other than `success` or `prune` decodes as `Failure`.
/// A failed experiment is still scored with the value it reported; only
/// `Prune` discards the trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExperimentStatus {
    Success,
    Prune,
    Failure,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Prune => "prune",
            Self::Failure => "failure",
        }
    }
}

impl From<String> for ExperimentStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "prune" => Self::Prune,
            _ => Self::Failure,
        }
    }
}

impl From<ExperimentStatus> for String {
    fn from(value: ExperimentStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed result of one experiment run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub objective_value: f64,
    pub status: ExperimentStatus,
}

impl ExperimentOutcome {
    pub fn new(objective_value: f64, status: ExperimentStatus) -> Self {
        Self {
            objective_value,
            status,
        }
    }

    pub fn success(objective_value: f64) -> Self {
        Self::new(objective_value, ExperimentStatus::Success)
    }

    pub fn prune(objective_value: f64) -> Self {
        Self::new(objective_value, ExperimentStatus::Prune)
    }
}

/// Executes a real experiment for a concrete tunable assignment.
pub trait ExperimentRunner: Send + Sync {
    fn perform_experiment(&self, tunables: &[ExperimentTunable]) -> HpoResult<ExperimentOutcome>;
}

impl<F> ExperimentRunner for F
where
    F: Fn(&[ExperimentTunable]) -> HpoResult<ExperimentOutcome> + Send + Sync,
{
    fn perform_experiment(&self, tunables: &[ExperimentTunable]) -> HpoResult<ExperimentOutcome> {
        self(tunables)
    }
}

/// Diagnostic record of a single trial: what was tried and how it ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub experiment_tunables: Vec<ExperimentTunable>,
    pub experiment_status: ExperimentStatus,
}
