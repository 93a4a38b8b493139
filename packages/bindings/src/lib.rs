use napi::Result as NapiResult;
use napi_derive::napi;

use dcf_core::analysis::{self, AnalysisRequest};
use dcf_core::monte_carlo::simulation::{self, CancellationToken};
use dcf_core::monte_carlo::SimulationConfig;
use dcf_core::valuation::dcf;
use dcf_core::valuation::ParameterSet;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Point valuation. Takes a parameter set as JSON, returns the output envelope.
#[napi]
pub fn compute_valuation(params_json: String) -> NapiResult<String> {
    let params: ParameterSet = serde_json::from_str(&params_json).map_err(to_napi_error)?;
    let output = dcf::value_with_metadata(&params).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Monte Carlo run. `config_json` is an optional simulation configuration;
/// omitted fields take their defaults.
#[napi]
pub fn run_monte_carlo(params_json: String, config_json: Option<String>) -> NapiResult<String> {
    let params: ParameterSet = serde_json::from_str(&params_json).map_err(to_napi_error)?;
    let config: SimulationConfig = match config_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => SimulationConfig::default(),
    };
    let output = simulation::simulate_with_metadata(&params, &config, &CancellationToken::new())
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Valuation plus simulation for an `{ ticker, parameters, simulation }` request.
#[napi]
pub fn run_analysis(request_json: String) -> NapiResult<String> {
    let request: AnalysisRequest = serde_json::from_str(&request_json).map_err(to_napi_error)?;
    let output = analysis::run_analysis(&request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
