//! Recommendation requests and results.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::{HpoError, HpoResult};
use crate::tunable::{Tunable, TunableValue, ValueType};
use crate::validation_error;

/// Whether we are minimizing or maximizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimize => "minimize",
            Self::Maximize => "maximize",
        }
    }

    /// True when `candidate` strictly improves on `incumbent`.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Minimize => candidate < incumbent,
            Self::Maximize => candidate > incumbent,
        }
    }

    /// Maps an objective value to a loss where lower is always better.
    pub fn to_loss(&self, value: f64) -> f64 {
        match self {
            Self::Minimize => value,
            Self::Maximize => -value,
        }
    }
}

impl FromStr for Direction {
    type Err = HpoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimize" => Ok(Self::Minimize),
            "maximize" => Ok(Self::Maximize),
            _ => Err(HpoError::UnknownDirection {
                direction: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = HpoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Direction> for String {
    fn from(value: Direction) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sampling strategy used to drive a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HpoAlgoImpl {
    /// Tree-structured Parzen estimator, one parameter at a time.
    OptunaTpe,
    /// Tree-structured Parzen estimator over the joint search space.
    OptunaTpeMultivariate,
    /// Sequential-model-based search around the incumbent.
    OptunaSkopt,
}

impl HpoAlgoImpl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OptunaTpe => "optuna_tpe",
            Self::OptunaTpeMultivariate => "optuna_tpe_multivariate",
            Self::OptunaSkopt => "optuna_skopt",
        }
    }
}

impl FromStr for HpoAlgoImpl {
    type Err = HpoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optuna_tpe" => Ok(Self::OptunaTpe),
            "optuna_tpe_multivariate" => Ok(Self::OptunaTpeMultivariate),
            "optuna_skopt" => Ok(Self::OptunaSkopt),
            _ => Err(HpoError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for HpoAlgoImpl {
    type Error = HpoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HpoAlgoImpl> for String {
    fn from(value: HpoAlgoImpl) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for HpoAlgoImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to produce one recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// The application being optimized.
    pub application_name: String,
    pub direction: Direction,
    pub hpo_algo_impl: HpoAlgoImpl,
    /// Identifier of the application run being optimized.
    pub id: String,
    /// Name of the objective function (e.g. "transaction_response_time").
    pub objective_function: String,
    pub tunables: Vec<Tunable>,
    /// Value type of the objective function.
    pub value_type: ValueType,
}

impl RecommendationRequest {
    /// Tunable names must be unique; the best trial is mapped back by name.
    pub fn validate(&self) -> HpoResult<()> {
        let mut seen = HashSet::new();
        for tunable in &self.tunables {
            if !seen.insert(tunable.name.as_str()) {
                return Err(validation_error!("duplicate tunable name: {}", tunable.name));
            }
        }
        Ok(())
    }
}

/// Objective function name, best value and value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveValue {
    pub name: String,
    pub value: f64,
    pub value_type: ValueType,
}

/// One tunable of the recommended configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedTunable {
    pub name: String,
    pub value: TunableValue,
    pub value_type: ValueType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalValue {
    pub objective_function: ObjectiveValue,
    pub tunables: Vec<RecommendedTunable>,
}

/// The best configuration found by a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedConfig {
    pub id: String,
    pub application_name: String,
    pub direction: Direction,
    pub optimal_value: OptimalValue,
}

impl RecommendedConfig {
    pub fn tunable(&self, name: &str) -> Option<&RecommendedTunable> {
        self.optimal_value.tunables.iter().find(|t| t.name == name)
    }
}
