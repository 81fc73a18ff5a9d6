// Recommendation service: runs each trial as an external command

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use hpo_types::{
    config_error, ExperimentOutcome, ExperimentRunner, ExperimentTunable, HpoError, HpoResult,
};
use tracing::{debug, warn};

/// Command line run once per trial.
pub const EXPERIMENT_COMMAND_VAR: &str = "HPO_EXPERIMENT_COMMAND";

/// Runs an experiment as a child process.
///
/// The trial configuration is written to the child's stdin as JSON. The child
/// reports its result as the last non-empty line of stdout:
///
/// ```json
/// {"objective_value": 1.23, "status": "success"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a whitespace-separated command line. No shell quoting is applied.
    pub fn from_command_line(line: &str) -> HpoResult<Self> {
        let mut parts = line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| config_error!("experiment command is empty"))?;
        Ok(Self::new(program, parts))
    }

    pub fn from_env() -> HpoResult<Self> {
        let line = std::env::var(EXPERIMENT_COMMAND_VAR)
            .map_err(|_| config_error!("missing required setting: {}", EXPERIMENT_COMMAND_VAR))?;
        Self::from_command_line(&line)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl ExperimentRunner for CommandRunner {
    fn perform_experiment(&self, tunables: &[ExperimentTunable]) -> HpoResult<ExperimentOutcome> {
        let input = serde_json::to_vec(tunables)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // Commands that ignore their input may exit before reading it
            if let Err(e) = stdin.write_all(&input) {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, stderr.trim());
        }

        if !output.status.success() {
            warn!("Experiment command {} exited with {}", self.program, output.status);
            return Err(HpoError::Experiment {
                message: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }

        parse_outcome(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the outcome from the last non-empty line of `stdout`.
pub fn parse_outcome(stdout: &str) -> HpoResult<ExperimentOutcome> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| HpoError::Experiment {
            message: "experiment produced no output".to_string(),
        })?;

    serde_json::from_str(line).map_err(|e| HpoError::Experiment {
        message: format!("invalid experiment output '{line}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpo_types::{ExperimentStatus, TunableValue};

    #[test]
    fn splits_command_line() {
        let runner = CommandRunner::from_command_line("  python3 bench.py --quick ").unwrap();
        assert_eq!(runner.program(), "python3");
        assert_eq!(runner.args(), ["bench.py", "--quick"]);
        assert!(matches!(
            CommandRunner::from_command_line("   "),
            Err(HpoError::Config(_))
        ));
    }

    #[test]
    fn parses_last_line() {
        let outcome = parse_outcome("warming up\n{\"objective_value\": 1.5, \"status\": \"prune\"}\n\n").unwrap();
        assert_eq!(outcome, ExperimentOutcome::prune(1.5));

        assert!(parse_outcome("").is_err());
        assert!(parse_outcome("done").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn runs_command_with_configuration_on_stdin() {
        let runner = CommandRunner::new(
            "sh",
            [
                "-c",
                r#"grep -q '"tunable_name":"replicas"' && echo '{"objective_value": 4.2, "status": "success"}'"#,
            ],
        );
        let outcome = runner
            .perform_experiment(&[ExperimentTunable::new("replicas", TunableValue::Integer(3))])
            .unwrap();
        assert_eq!(outcome.objective_value, 4.2);
        assert_eq!(outcome.status, ExperimentStatus::Success);
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_an_experiment_error() {
        let runner = CommandRunner::new("sh", ["-c", "echo overloaded >&2; exit 3"]);
        let err = runner.perform_experiment(&[]).unwrap_err();
        assert!(matches!(err, HpoError::Experiment { ref message } if message.contains("overloaded")));

        let missing = CommandRunner::new("definitely-not-a-real-binary-hpo", Vec::<String>::new());
        assert!(matches!(missing.perform_experiment(&[]), Err(HpoError::Io(_))));
    }
}
