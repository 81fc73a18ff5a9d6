//! # hpo-optimizer
//!
//! Bayesian search over tunable configurations.
//!
//! Provides the study engine (trials, worker pool, best-trial selection), the
//! pluggable samplers (TPE, multivariate TPE, sequential model-based), the
//! objective adapter that drives an [`hpo_types::ExperimentRunner`], and the
//! [`Recommender`] that turns a request into a recommended configuration.

mod distribution;
mod objective;
mod recommend;
mod sampler;
mod settings;
mod study;
mod trial;

pub use distribution::{Distribution, ParamValue};
pub use objective::{round_objective, TrialHistory, TunableObjective};
pub use recommend::{build_recommendation, RecommendationRun, Recommender};
pub use sampler::{
    create_sampler, intersection_search_space, RandomSampler, Sampler, SearchSpace, SmboSampler,
    TpeSampler,
};
pub use settings::{StudySettings, N_JOBS_VAR, N_TRIALS_VAR, SEED_VAR};
pub use study::{Study, StudyId, StudySummary};
pub use trial::{FrozenTrial, Trial, TrialState};
