//! Study: a bounded search over trials, run by a pool of workers.

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hpo_types::{validation_error, Direction, HpoError, HpoResult, TrialError, TunableValue};

use crate::sampler::{intersection_search_space, Sampler};
use crate::trial::{FrozenTrial, Trial, TrialState};

/// Unique study identifier.
pub type StudyId = Uuid;

/// Aggregate counts for a finished (or running) study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub study_id: StudyId,
    pub direction: Direction,
    pub sampler: String,
    pub trials_total: usize,
    pub trials_completed: usize,
    pub trials_pruned: usize,
    pub trials_failed: usize,
    pub best_trial: Option<usize>,
    pub best_value: Option<f64>,
}

/// Owns the sampler and every finished trial of one optimization run.
pub struct Study {
    id: StudyId,
    direction: Direction,
    sampler: Box<dyn Sampler>,
    trials: Mutex<Vec<FrozenTrial>>,
}

impl Study {
    pub fn new(direction: Direction, sampler: Box<dyn Sampler>) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction,
            sampler,
            trials: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> StudyId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn sampler_name(&self) -> &str {
        self.sampler.name()
    }

    /// Start trial `number` against a snapshot of the completed trials.
    pub fn ask(&self, number: usize) -> Trial<'_> {
        let history = self.completed_trials();
        let space = intersection_search_space(&history);
        let relative = self
            .sampler
            .sample_relative(&space, self.direction, &history);
        Trial::new(
            number,
            self.direction,
            self.sampler.as_ref(),
            history,
            space,
            relative,
        )
    }

    /// Finish `trial` with the objective's result.
    pub fn tell(&self, trial: Trial<'_>, result: Result<f64, TrialError>) -> FrozenTrial {
        let number = trial.number();
        let frozen = match result {
            Ok(value) if value.is_finite() => {
                let frozen = trial.finish(TrialState::Complete, Some(value), None);
                debug!(
                    "Trial {} finished with value: {} and parameters: {:?}",
                    number,
                    value,
                    frozen.tunable_params()
                );
                frozen
            }
            Ok(value) => {
                warn!("Trial {} failed: objective value {} is not finite", number, value);
                trial.finish(
                    TrialState::Failed,
                    None,
                    Some(format!("objective value {value} is not finite")),
                )
            }
            Err(TrialError::Pruned) => {
                debug!("Trial {} pruned", number);
                trial.finish(TrialState::Pruned, None, None)
            }
            Err(e) => {
                warn!("Trial {} failed: {}", number, e);
                trial.finish(TrialState::Failed, None, Some(e.to_string()))
            }
        };

        self.trials.lock().push(frozen.clone());
        frozen
    }

    /// Run exactly `n_trials` trials across `n_jobs` worker threads.
    ///
    /// Blocks until every trial has finished. Pruned and failed trials count
    /// toward the budget; they are not retried.
    pub fn optimize<F>(&self, n_trials: usize, n_jobs: usize, objective: F) -> HpoResult<()>
    where
        F: Fn(&mut Trial<'_>) -> Result<f64, TrialError> + Sync,
    {
        if n_jobs == 0 {
            return Err(validation_error!("n_jobs must be at least 1"));
        }
        if n_trials == 0 {
            return Ok(());
        }

        let first = self.trials.lock().len();
        let workers = n_jobs.min(n_trials);
        info!(
            "Study {} optimizing {} trials with {} worker(s) using {} sampler",
            self.id,
            n_trials,
            workers,
            self.sampler.name()
        );

        // Queue holds at most one pending number per worker
        let (tx, rx) = bounded(workers);
        let receivers: Vec<_> = (0..workers).map(|_| rx.clone()).collect();
        drop(rx);

        std::thread::scope(|scope| {
            scope.spawn(move || {
                for number in first..first + n_trials {
                    if tx.send(number).is_err() {
                        break;
                    }
                }
            });

            for (worker, rx) in receivers.into_iter().enumerate() {
                let objective = &objective;
                scope.spawn(move || {
                    for number in rx.iter() {
                        debug!("Worker {} starting trial {}", worker, number);
                        let mut trial = self.ask(number);
                        let result = objective(&mut trial);
                        self.tell(trial, result);
                    }
                });
            }
        });

        Ok(())
    }

    /// All finished trials ordered by number.
    pub fn trials(&self) -> Vec<FrozenTrial> {
        let mut trials = self.trials.lock().clone();
        trials.sort_by_key(|t| t.number);
        trials
    }

    pub fn completed_trials(&self) -> Vec<FrozenTrial> {
        self.trials()
            .into_iter()
            .filter(FrozenTrial::is_complete)
            .collect()
    }

    /// The best completed trial; ties go to the lowest trial number.
    pub fn best_trial(&self) -> HpoResult<FrozenTrial> {
        let mut best: Option<FrozenTrial> = None;
        for trial in self.completed_trials() {
            let Some(value) = trial.value else { continue };
            let improves = match &best {
                None => true,
                Some(current) => current
                    .value
                    .map_or(true, |incumbent| self.direction.is_better(value, incumbent)),
            };
            if improves {
                best = Some(trial);
            }
        }
        best.ok_or(HpoError::NoCompletedTrials)
    }

    pub fn best_value(&self) -> HpoResult<f64> {
        self.best_trial()?.value.ok_or(HpoError::NoCompletedTrials)
    }

    pub fn best_params(&self) -> HpoResult<BTreeMap<String, TunableValue>> {
        Ok(self.best_trial()?.tunable_params())
    }

    pub fn summary(&self) -> StudySummary {
        let trials = self.trials();
        let count = |state: TrialState| trials.iter().filter(|t| t.state == state).count();
        let best = self.best_trial().ok();
        StudySummary {
            study_id: self.id,
            direction: self.direction,
            sampler: self.sampler.name().to_string(),
            trials_total: trials.len(),
            trials_completed: count(TrialState::Complete),
            trials_pruned: count(TrialState::Pruned),
            trials_failed: count(TrialState::Failed),
            best_trial: best.as_ref().map(|t| t.number),
            best_value: best.and_then(|t| t.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{RandomSampler, TpeSampler};

    fn quadratic(trial: &mut Trial<'_>) -> Result<f64, TrialError> {
        let x = trial.suggest_int("x", -10, 10, 1)?;
        Ok(((x - 3) * (x - 3)) as f64)
    }

    #[test]
    fn runs_exact_trial_budget() {
        let study = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(1))));
        study.optimize(25, 1, quadratic).unwrap();

        let trials = study.trials();
        assert_eq!(trials.len(), 25);
        assert_eq!(
            trials.iter().map(|t| t.number).collect::<Vec<_>>(),
            (0..25).collect::<Vec<_>>()
        );
    }

    #[test]
    fn parallel_workers_run_every_trial_once() {
        let study = Study::new(Direction::Minimize, Box::new(TpeSampler::new(Some(2))));
        study.optimize(40, 4, quadratic).unwrap();

        let numbers: Vec<usize> = study.trials().iter().map(|t| t.number).collect();
        assert_eq!(numbers, (0..40).collect::<Vec<_>>());
        assert_eq!(study.summary().trials_completed, 40);
    }

    #[test]
    fn best_trial_respects_direction() {
        let min = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(3))));
        min.optimize(60, 1, quadratic).unwrap();
        let best = min.best_value().unwrap();
        assert!(min
            .completed_trials()
            .iter()
            .all(|t| t.value.unwrap() >= best));

        let max = Study::new(Direction::Maximize, Box::new(RandomSampler::new(Some(3))));
        max.optimize(60, 1, quadratic).unwrap();
        let best = max.best_value().unwrap();
        assert!(max
            .completed_trials()
            .iter()
            .all(|t| t.value.unwrap() <= best));
    }

    #[test]
    fn ties_keep_the_earliest_trial() {
        let study = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(4))));
        study
            .optimize(5, 1, |trial: &mut Trial<'_>| {
                trial.suggest_int("x", 0, 3, 1)?;
                Ok(1.0)
            })
            .unwrap();
        assert_eq!(study.best_trial().unwrap().number, 0);
    }

    #[test]
    fn pruned_trials_never_win() {
        let study = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(5))));
        study
            .optimize(10, 2, |trial: &mut Trial<'_>| {
                trial.suggest_int("x", 0, 3, 1)?;
                if trial.number() % 2 == 0 {
                    Err(TrialError::Pruned)
                } else {
                    Ok(trial.number() as f64)
                }
            })
            .unwrap();

        let summary = study.summary();
        assert_eq!(summary.trials_pruned, 5);
        assert_eq!(summary.trials_completed, 5);
        assert_eq!(summary.best_trial, Some(1));
        assert_eq!(study.best_value().unwrap(), 1.0);
    }

    #[test]
    fn errors_and_non_finite_values_fail_the_trial() {
        let study = Study::new(Direction::Maximize, Box::new(RandomSampler::new(Some(6))));
        study
            .optimize(3, 1, |trial: &mut Trial<'_>| match trial.number() {
                0 => Ok(f64::NAN),
                1 => Err(TrialError::Failed("experiment crashed".into())),
                _ => Ok(7.5),
            })
            .unwrap();

        let trials = study.trials();
        assert_eq!(trials[0].state, TrialState::Failed);
        assert_eq!(trials[1].state, TrialState::Failed);
        assert!(trials[1].error.as_deref().unwrap().contains("experiment crashed"));
        assert_eq!(study.best_value().unwrap(), 7.5);
    }

    #[test]
    fn all_pruned_has_no_best_trial() {
        let study = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(7))));
        study
            .optimize(4, 1, |_: &mut Trial<'_>| Err(TrialError::Pruned))
            .unwrap();
        assert!(matches!(study.best_trial(), Err(HpoError::NoCompletedTrials)));
        assert_eq!(study.summary().best_trial, None);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let study = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(8))));
        assert!(study.optimize(3, 0, quadratic).is_err());
        study.optimize(0, 1, quadratic).unwrap();
        assert!(study.trials().is_empty());
    }

    #[test]
    fn large_budget_streams_through_small_queue() {
        let study = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(10))));
        study
            .optimize(500, 3, |trial: &mut Trial<'_>| {
                Ok(trial.suggest_int("x", 0, 9, 1)? as f64)
            })
            .unwrap();

        let numbers: Vec<usize> = study.trials().iter().map(|t| t.number).collect();
        assert_eq!(numbers, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn repeated_optimize_continues_numbering() {
        let study = Study::new(Direction::Minimize, Box::new(RandomSampler::new(Some(9))));
        study.optimize(3, 1, quadratic).unwrap();
        study.optimize(2, 1, quadratic).unwrap();
        assert_eq!(
            study.trials().iter().map(|t| t.number).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
    }
}
