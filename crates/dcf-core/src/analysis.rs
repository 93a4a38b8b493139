//! Combined valuation and simulation request.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::monte_carlo::config::SimulationConfig;
use crate::monte_carlo::simulation::{
    CancellationToken, MonteCarloResult, MonteCarloSimulator, SimulationAssumptions,
};
use crate::types::{with_metadata, ComputationOutput};
use crate::valuation::dcf::{compute_valuation, valuation_warnings, ValuationResult};
use crate::valuation::parameters::ParameterSet;
use crate::DcfResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Label only; the engine never looks figures up by ticker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub parameters: ParameterSet,
    /// `None` runs the simulation with the default configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub valuation: ValuationResult,
    pub monte_carlo: Option<MonteCarloResult>,
}

impl AnalysisRequest {
    pub fn new(parameters: ParameterSet) -> Self {
        AnalysisRequest {
            ticker: None,
            parameters,
            simulation: None,
        }
    }

    /// Upper-cased, trimmed ticker, if one was given and is non-empty.
    pub fn normalized_ticker(&self) -> Option<String> {
        self.ticker
            .as_deref()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
    }
}

/// Point valuation plus Monte Carlo distribution in one envelope.
pub fn run_analysis(request: &AnalysisRequest) -> DcfResult<ComputationOutput<AnalysisReport>> {
    run_analysis_with_token(request, &CancellationToken::new())
}

/// As [`run_analysis`], with a token that can abort the simulation.
pub fn run_analysis_with_token(
    request: &AnalysisRequest,
    token: &CancellationToken,
) -> DcfResult<ComputationOutput<AnalysisReport>> {
    let start = Instant::now();
    let params = &request.parameters;
    let ticker = request.normalized_ticker();

    let valuation = compute_valuation(params)?;
    let mut warnings = valuation_warnings(params, &valuation)?;

    let config = request.simulation.clone().unwrap_or_default();
    let monte_carlo = if config.enabled {
        let result = MonteCarloSimulator::new(config.clone()).run(params, token)?;
        if result.excluded_samples > 0 {
            warnings.push(format!(
                "[Monte Carlo] {} of {} samples were excluded after failing validation",
                result.excluded_samples, result.num_simulations
            ));
        }
        Some(result)
    } else {
        None
    };

    info!(
        ticker = ticker.as_deref().unwrap_or("-"),
        equity_value = valuation.equity_value,
        simulated = monte_carlo.is_some(),
        "analysis complete"
    );

    Ok(with_metadata(
        "FCFF DCF with Monte Carlo sensitivity",
        &SimulationAssumptions {
            parameters: params,
            simulation: &config,
        },
        warnings,
        start.elapsed().as_micros() as u64,
        AnalysisReport {
            ticker,
            valuation,
            monte_carlo,
        },
    ))
}
