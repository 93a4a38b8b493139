use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tracing::info;

use dcf_core::analysis::{self, AnalysisRequest};
use dcf_core::monte_carlo::SimulationConfig;

use super::monte_carlo::SimulationArgs;
use super::valuation::ParameterArgs;
use crate::input;

/// Arguments for a combined valuation and Monte Carlo analysis
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct AnalyzeArgs {
    /// Path to a JSON or YAML analysis request
    #[arg(long)]
    pub input: Option<String>,

    /// Ticker label for the report and export file name
    #[arg(long)]
    pub ticker: Option<String>,

    /// Skip the Monte Carlo simulation
    #[arg(long)]
    pub no_simulation: bool,

    /// Directory to write dcf_analysis_<TICKER>_<date>.json into
    #[arg(long)]
    pub export: Option<PathBuf>,

    #[command(flatten)]
    pub params: ParameterArgs,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: AnalysisRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        AnalysisRequest::new(args.params.build()?)
    };

    args.params.apply(&mut request.parameters);
    if args.ticker.is_some() {
        request.ticker = args.ticker.clone();
    }
    let mut config = request.simulation.take().unwrap_or_default();
    args.simulation.apply(&mut config);
    if args.no_simulation {
        config = SimulationConfig {
            enabled: false,
            ..config
        };
    }
    request.simulation = Some(config);

    let output = analysis::run_analysis(&request)?;
    let value = serde_json::to_value(&output)?;

    if let Some(ref dir) = args.export {
        let path = export_path(dir, request.normalized_ticker().as_deref());
        fs::write(&path, serde_json::to_string_pretty(&value)?)
            .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
        info!(path = %path.display(), "analysis exported");
        eprintln!("{} {}", "exported".green().bold(), path.display());
    }

    Ok(value)
}

/// `<dir>/dcf_analysis_<TICKER>_<YYYY-MM-DD>.json`, dated in local time.
fn export_path(dir: &Path, ticker: Option<&str>) -> PathBuf {
    let date = Local::now().format("%Y-%m-%d");
    dir.join(format!(
        "dcf_analysis_{}_{}.json",
        ticker.unwrap_or("UNKNOWN"),
        date
    ))
}
