use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hpo_optimizer::{Recommender, StudySettings};
use hpo_service::CommandRunner;
use hpo_types::RecommendationRequest;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: hpo-service <request.json>")?;

    let settings = StudySettings::from_env().context("failed to load study settings")?;
    let runner = CommandRunner::from_env()?;

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read recommendation request {path}"))?;
    let request: RecommendationRequest = serde_json::from_str(&raw)
        .with_context(|| format!("invalid recommendation request {path}"))?;

    info!(
        "Running {} trials for {} using {}",
        settings.n_trials,
        request.application_name,
        runner.program()
    );

    let recommended = Recommender::new(settings, runner).recommend(&request)?;
    println!("{}", serde_json::to_string_pretty(&recommended)?);

    Ok(())
}
