//! Study settings loaded from the environment.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::str::FromStr;

use hpo_types::{config_error, HpoResult};

/// Total number of trials.
pub const N_TRIALS_VAR: &str = "n_trials";
/// Worker parallelism; `-1` means one worker per available core.
pub const N_JOBS_VAR: &str = "n_jobs";
/// Optional sampler seed.
pub const SEED_VAR: &str = "hpo_seed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySettings {
    pub n_trials: usize,
    pub n_jobs: usize,
    pub seed: Option<u64>,
}

impl StudySettings {
    pub fn new(n_trials: usize, n_jobs: usize) -> Self {
        Self {
            n_trials,
            n_jobs,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> HpoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> HpoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let n_trials: usize = parse_required(&lookup, N_TRIALS_VAR)?;
        if n_trials == 0 {
            return Err(config_error!("{} must be at least 1", N_TRIALS_VAR));
        }

        let n_jobs = match parse_required::<i64, _>(&lookup, N_JOBS_VAR)? {
            -1 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            n if n >= 1 => usize::try_from(n)
                .map_err(|_| config_error!("{} is out of range: {}", N_JOBS_VAR, n))?,
            n => {
                return Err(config_error!(
                    "{} must be at least 1 or -1, got {}",
                    N_JOBS_VAR,
                    n
                ))
            }
        };

        let seed = match lookup(SEED_VAR) {
            Some(raw) => Some(parse(SEED_VAR, &raw)?),
            None => None,
        };

        Ok(Self {
            n_trials,
            n_jobs,
            seed,
        })
    }
}

fn parse_required<T, F>(lookup: &F, key: &str) -> HpoResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).ok_or_else(|| config_error!("missing required setting: {}", key))?;
    parse(key, &raw)
}

fn parse<T>(key: &str, raw: &str) -> HpoResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| config_error!("invalid value for {}: '{}' ({})", key, raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpo_types::HpoError;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> HpoResult<StudySettings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StudySettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn loads_required_values() {
        let settings = load(&[("n_trials", "20"), ("n_jobs", " 4 ")]).unwrap();
        assert_eq!(settings, StudySettings::new(20, 4));

        let seeded = load(&[("n_trials", "5"), ("n_jobs", "1"), ("hpo_seed", "42")]).unwrap();
        assert_eq!(seeded, StudySettings::new(5, 1).with_seed(42));
    }

    #[test]
    fn minus_one_uses_available_cores() {
        let settings = load(&[("n_trials", "5"), ("n_jobs", "-1")]).unwrap();
        assert!(settings.n_jobs >= 1);
    }

    #[test]
    fn missing_values_fail_fast() {
        let err = load(&[("n_jobs", "1")]).unwrap_err();
        assert!(matches!(err, HpoError::Config(ref m) if m.contains("n_trials")));

        let err = load(&[("n_trials", "1")]).unwrap_err();
        assert!(matches!(err, HpoError::Config(ref m) if m.contains("n_jobs")));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(load(&[("n_trials", "ten"), ("n_jobs", "1")]).is_err());
        assert!(load(&[("n_trials", "2.5"), ("n_jobs", "1")]).is_err());
        assert!(load(&[("n_trials", "0"), ("n_jobs", "1")]).is_err());
        assert!(load(&[("n_trials", "3"), ("n_jobs", "0")]).is_err());
        assert!(load(&[("n_trials", "3"), ("n_jobs", "-2")]).is_err());
        assert!(load(&[("n_trials", "3"), ("n_jobs", "1"), ("hpo_seed", "-7")]).is_err());
    }
}
