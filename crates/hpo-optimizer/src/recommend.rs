//! Recommendation driver: one fixed-budget study per request.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hpo_types::{
    ExperimentRunner, HpoError, HpoResult, ObjectiveValue, OptimalValue, RecommendationRequest,
    RecommendedConfig, RecommendedTunable, TrialRecord,
};

use crate::objective::{TrialHistory, TunableObjective};
use crate::sampler::create_sampler;
use crate::settings::StudySettings;
use crate::study::{Study, StudySummary};
use crate::trial::{FrozenTrial, Trial};

/// Everything a single recommendation run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRun {
    pub recommended: RecommendedConfig,
    pub trials: Vec<TrialRecord>,
    pub summary: StudySummary,
}

/// Runs studies against an experiment runner.
pub struct Recommender<R> {
    settings: StudySettings,
    runner: R,
}

impl<R: ExperimentRunner> Recommender<R> {
    pub fn new(settings: StudySettings, runner: R) -> Self {
        Self { settings, runner }
    }

    pub fn settings(&self) -> &StudySettings {
        &self.settings
    }

    /// Search for the best configuration of `request.tunables`.
    pub fn recommend(&self, request: &RecommendationRequest) -> HpoResult<RecommendedConfig> {
        self.run(request).map(|run| run.recommended)
    }

    /// Like [`Recommender::recommend`], also returning the trial records and
    /// study summary.
    pub fn run(&self, request: &RecommendationRequest) -> HpoResult<RecommendationRun> {
        request.validate()?;

        let sampler = create_sampler(request.hpo_algo_impl, self.settings.seed);
        let study = Study::new(request.direction, sampler);
        info!(
            "Recommending {} for {} ({}) with {}: {} trials, {} job(s)",
            request.objective_function,
            request.application_name,
            request.id,
            request.hpo_algo_impl,
            self.settings.n_trials,
            self.settings.n_jobs
        );

        let history = TrialHistory::new();
        let objective = TunableObjective::new(&request.tunables, &self.runner, &history);
        study.optimize(self.settings.n_trials, self.settings.n_jobs, |trial: &mut Trial<'_>| {
            objective.evaluate(trial)
        })?;

        let trials = history.into_records();
        debug!("All trials: {:?}", trials);

        let best = study.best_trial()?;
        info!("Best parameter: {:?}", best.tunable_params());
        info!("Best value: {:?}", best.value);
        info!("Best trial: {}", best.number);

        let recommended = build_recommendation(request, &best)?;
        info!("Recommended config: {:?}", recommended);

        Ok(RecommendationRun {
            recommended,
            trials,
            summary: study.summary(),
        })
    }
}

/// Map `best` back onto the declared tunables, in declaration order.
pub fn build_recommendation(
    request: &RecommendationRequest,
    best: &FrozenTrial,
) -> HpoResult<RecommendedConfig> {
    let value = best.value.ok_or(HpoError::NoCompletedTrials)?;

    let tunables = request
        .tunables
        .iter()
        .map(|tunable| {
            let value = best
                .tunable_value(&tunable.name)
                .ok_or_else(|| HpoError::MissingParameter {
                    name: tunable.name.clone(),
                })?;
            Ok(RecommendedTunable {
                name: tunable.name.clone(),
                value,
                value_type: tunable.value_type(),
            })
        })
        .collect::<HpoResult<Vec<_>>>()?;

    Ok(RecommendedConfig {
        id: request.id.clone(),
        application_name: request.application_name.clone(),
        direction: request.direction,
        optimal_value: OptimalValue {
            objective_function: ObjectiveValue {
                name: request.objective_function.clone(),
                value,
                value_type: request.value_type,
            },
            tunables,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::RandomSampler;
    use hpo_types::{
        Direction, ExperimentOutcome, ExperimentStatus, ExperimentTunable, HpoAlgoImpl, Tunable,
        TunableDomain, TunableValue, ValueType,
    };

    fn request(hpo_algo_impl: HpoAlgoImpl) -> RecommendationRequest {
        RecommendationRequest {
            application_name: "petclinic".into(),
            direction: Direction::Minimize,
            hpo_algo_impl,
            id: "a123".into(),
            objective_function: "transaction_response_time".into(),
            tunables: vec![
                Tunable::double("cpu", 0.5, 2.0, 0.1).unwrap(),
                Tunable::integer("replicas", 1, 5, 1).unwrap(),
                Tunable::categorical("mode", ["fast", "safe"]).unwrap(),
            ],
            value_type: ValueType::Double,
        }
    }

    fn constant(_: &[ExperimentTunable]) -> HpoResult<ExperimentOutcome> {
        Ok(ExperimentOutcome::success(1.23))
    }

    #[test]
    fn recommends_with_declared_types() {
        let recommender = Recommender::new(StudySettings::new(5, 1), constant);
        let config = recommender.recommend(&request(HpoAlgoImpl::OptunaTpe)).unwrap();

        assert_eq!(config.id, "a123");
        assert_eq!(config.application_name, "petclinic");
        assert_eq!(config.optimal_value.objective_function.value, 1.23);
        assert_eq!(
            config.optimal_value.objective_function.name,
            "transaction_response_time"
        );

        let types: Vec<(&str, ValueType)> = config
            .optimal_value
            .tunables
            .iter()
            .map(|t| (t.name.as_str(), t.value_type))
            .collect();
        assert_eq!(
            types,
            vec![
                ("cpu", ValueType::Double),
                ("replicas", ValueType::Integer),
                ("mode", ValueType::Categorical),
            ]
        );
        assert!(matches!(config.tunable("cpu").unwrap().value, TunableValue::Double(_)));
        assert!(matches!(config.tunable("replicas").unwrap().value, TunableValue::Integer(_)));
    }

    #[test]
    fn run_reports_every_trial() {
        let runner = |tunables: &[ExperimentTunable]| -> HpoResult<ExperimentOutcome> {
            let replicas = tunables
                .iter()
                .find(|t| t.tunable_name == "replicas")
                .and_then(|t| t.tunable_value.as_f64())
                .unwrap_or(0.0);
            if replicas > 3.0 {
                Ok(ExperimentOutcome::prune(0.0))
            } else {
                Ok(ExperimentOutcome::success(replicas))
            }
        };
        let settings = StudySettings::new(12, 1).with_seed(11);
        let run = Recommender::new(settings, runner)
            .run(&request(HpoAlgoImpl::OptunaSkopt))
            .unwrap();

        assert_eq!(run.trials.len(), 12);
        assert_eq!(run.summary.trials_total, 12);
        assert_eq!(
            run.summary.trials_pruned,
            run.trials
                .iter()
                .filter(|r| r.experiment_status == ExperimentStatus::Prune)
                .count()
        );
        assert!(run.recommended.optimal_value.objective_function.value <= 3.0);
    }

    #[test]
    fn duplicate_tunables_are_rejected() {
        let mut request = request(HpoAlgoImpl::OptunaTpe);
        request
            .tunables
            .push(Tunable::integer("replicas", 1, 3, 1).unwrap());
        let err = Recommender::new(StudySettings::new(2, 1), constant)
            .recommend(&request)
            .unwrap_err();
        assert!(matches!(err, HpoError::Validation(_)));
    }

    #[test]
    fn overflowing_integer_domain_fails_trials_without_panicking() {
        let mut request = request(HpoAlgoImpl::OptunaTpe);
        request.tunables = vec![Tunable {
            name: "x".into(),
            domain: TunableDomain::Integer {
                lower_bound: i64::MIN,
                upper_bound: i64::MAX,
                step: 1,
            },
        }];
        let run = Recommender::new(StudySettings::new(3, 2), constant).run(&request);
        assert!(matches!(run, Err(HpoError::NoCompletedTrials)));
    }

    #[test]
    fn missing_parameter_is_reported() {
        let sampler = RandomSampler::new(Some(1));
        let mut trial = Trial::new(
            0,
            Direction::Minimize,
            &sampler,
            Vec::new(),
            Default::default(),
            Default::default(),
        );
        trial.suggest_int("replicas", 1, 5, 1).unwrap();
        let best = trial.finish(crate::trial::TrialState::Complete, Some(2.0), None);

        let err = build_recommendation(&request(HpoAlgoImpl::OptunaTpe), &best).unwrap_err();
        assert!(matches!(err, HpoError::MissingParameter { ref name } if name == "cpu"));
    }
}
