use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use farm_investment::{EngineConfig, InMemoryHistory, Scenario, evaluate_scenario, seed_first_year};
use serde::de::DeserializeOwned;

/// Evaluate a dairy investment scenario and print the report as JSON
#[derive(Parser)]
#[command(name = "farm-investment", version)]
struct Cli {
    /// Scenario JSON file
    scenario: Option<PathBuf>,

    /// Evaluate the built-in base case instead of a file
    #[arg(long, conflicts_with = "scenario")]
    base_case: bool,

    /// Engine configuration JSON file; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded averages by year, used to seed the first projected year
    #[arg(long)]
    history: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
            EngineConfig::from_json_str(&raw).with_context(|| format!("Invalid config '{}'", path.display()))?
        }
        None => EngineConfig::default(),
    };
    let config = config.with_process_env().context("Invalid environment configuration")?;

    let mut scenario = match (&cli.scenario, cli.base_case) {
        (Some(path), _) => read_json::<Scenario>(path)?,
        (None, true) => Scenario::base_case(),
        (None, false) => bail!("Pass a scenario file or --base-case"),
    };

    if let Some(path) = &cli.history {
        let history: InMemoryHistory = read_json(path)?;
        if history.is_empty() {
            tracing::warn!(path = %path.display(), "History file records no years; using fallback prices");
        }
        scenario.assumptions = seed_first_year(&scenario.assumptions, &history, &config)?;
    }

    let report = evaluate_scenario(&scenario, &config)
        .with_context(|| format!("Failed to evaluate scenario '{}'", scenario.name))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse '{}'", path.display()))
}
