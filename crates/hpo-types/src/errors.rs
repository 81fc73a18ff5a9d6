use thiserror::Error;

/// Main error type for the recommender
#[derive(Error, Debug)]
pub enum HpoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown tunable value type: {value_type}")]
    UnknownValueType { value_type: String },

    #[error("Unknown HPO algorithm implementation: {name}")]
    UnknownAlgorithm { name: String },

    #[error("Unknown optimization direction: {direction}")]
    UnknownDirection { direction: String },

    #[error("Parameter conflict for '{name}': {reason}")]
    ParameterConflict { name: String, reason: String },

    #[error("No completed trials available")]
    NoCompletedTrials,

    #[error("Best trial has no value for tunable: {name}")]
    MissingParameter { name: String },

    #[error("Experiment error: {message}")]
    Experiment { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of an objective evaluation that did not produce a score.
///
/// `Pruned` is the abandonment signal: the study discards the trial without
/// scoring it. Every other variant marks the trial as failed.
#[derive(Error, Debug)]
pub enum TrialError {
    #[error("Trial pruned")]
    Pruned,

    #[error("Trial failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Hpo(#[from] HpoError),
}

impl TrialError {
    pub fn is_pruned(&self) -> bool {
        matches!(self, Self::Pruned)
    }
}

/// Result type alias for recommender operations
pub type HpoResult<T> = Result<T, HpoError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::HpoError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::HpoError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HpoError::Config(format!($($arg)*))
    };
}
