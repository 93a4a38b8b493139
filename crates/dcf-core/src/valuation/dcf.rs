use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::DcfError;
use crate::time_value::cagr;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::DcfResult;

use super::discount::{discount, equity_bridge, DiscountedYear};
use super::parameters::ParameterSet;
use super::projection::{base_free_cash_flow, build_base_fcf, project_cash_flows, ForecastCashFlows, UfcfBuild};
use super::terminal::terminal_value;
use super::wacc::{calculate_wacc, wacc_warnings, BetaSource, DiscountRateInput};

const TERMINAL_SHARE_WARNING: f64 = 0.75;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Ratios derived from the same inputs as the valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebit_margin: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capex_ratio: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_capital_ratio: Option<Rate>,
    /// Enterprise value / base revenue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_to_revenue: Option<f64>,
    /// CAGR from the base cash flow to the final forecast year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_cagr: Option<Rate>,
    /// PV(terminal) / EV
    pub terminal_value_pct: Rate,
}

/// Output of a single deterministic DCF valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub enterprise_value: Money,
    pub equity_value: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_value_per_share: Option<Money>,
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub beta: f64,
    pub beta_source: BetaSource,
    pub terminal_value: Money,
    pub terminal_growth: Rate,
    pub base_fcf: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_build: Option<UfcfBuild>,
    pub forecast_cash_flows: ForecastCashFlows,
    /// Year-by-year discounting detail
    pub discounted_cash_flows: Vec<DiscountedYear>,
    pub pv_forecast: Money,
    pub pv_terminal: Money,
    pub net_debt: Money,
    pub metrics: ValuationMetrics,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run one FCFF DCF valuation.
///
/// validate -> project -> WACC -> terminal value -> discount -> equity bridge.
/// Either a complete result is returned or the first failing stage's error.
pub fn compute_valuation(params: &ParameterSet) -> DcfResult<ValuationResult> {
    value_with_rate_shift(params, 0.0)
}

/// Valuation with `shift` added to the computed WACC before terminal value
/// and discounting. The inputs are validated unshifted, so a shift never
/// pushes a domain-checked rate out of range.
pub fn value_with_rate_shift(params: &ParameterSet, shift: Rate) -> DcfResult<ValuationResult> {
    params.validate()?;
    if !shift.is_finite() {
        return Err(DcfError::invalid(
            "discount_rate_shift",
            format!("Discount rate shift must be finite, got {shift}"),
        ));
    }

    let base_build = params
        .cash_flow_base
        .drivers()
        .map(|d| build_base_fcf(d, params.tax_rate));
    let base_fcf = match base_build {
        Some(ref build) => build.free_cash_flow,
        None => base_free_cash_flow(&params.cash_flow_base, params.tax_rate),
    };
    let forecast = project_cash_flows(base_fcf, &params.growth_rates)?;
    debug!(base_fcf, horizon = forecast.horizon(), "projected cash flows");

    let (rate_input, beta_source) = DiscountRateInput::from_parameters(params)?;
    let rate = calculate_wacc(&rate_input, beta_source)?;
    let wacc = rate.wacc + shift;
    debug!(wacc, shift, cost_of_equity = rate.cost_of_equity, "discount rate");

    let tv = terminal_value(forecast.terminal_year(), wacc, params.terminal_growth)?;
    let discounted = discount(&forecast, tv, wacc)?;

    let enterprise_value = discounted.enterprise_value;
    if !enterprise_value.is_finite() {
        return Err(DcfError::invalid(
            "cash_flow_base",
            "Enterprise value is not finite; inputs are out of range",
        ));
    }
    let equity_value = equity_bridge(enterprise_value, params.net_debt);
    let equity_value_per_share = params.shares_outstanding.map(|shares| equity_value / shares);

    let metrics = derive_metrics(
        params,
        base_fcf,
        &forecast,
        enterprise_value,
        discounted.pv_terminal,
    );
    debug!(enterprise_value, equity_value, "valuation complete");

    Ok(ValuationResult {
        enterprise_value,
        equity_value,
        equity_value_per_share,
        wacc,
        cost_of_equity: rate.cost_of_equity,
        beta: rate.beta,
        beta_source: rate.beta_source,
        terminal_value: tv,
        terminal_growth: params.terminal_growth,
        base_fcf,
        base_build,
        forecast_cash_flows: forecast,
        discounted_cash_flows: discounted.years,
        pv_forecast: discounted.pv_forecast,
        pv_terminal: discounted.pv_terminal,
        net_debt: params.net_debt,
        metrics,
    })
}

/// Valuation wrapped in the standard output envelope, with reasonableness
/// warnings.
pub fn value_with_metadata(params: &ParameterSet) -> DcfResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();
    let result = compute_valuation(params)?;
    let warnings = valuation_warnings(params, &result)?;
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "FCFF DCF (WACC-based, Gordon growth terminal value)",
        params,
        warnings,
        elapsed,
        result,
    ))
}

/// Non-blocking observations about a completed valuation.
pub fn valuation_warnings(params: &ParameterSet, result: &ValuationResult) -> DcfResult<Vec<String>> {
    let (rate_input, beta_source) = DiscountRateInput::from_parameters(params)?;
    let rate = calculate_wacc(&rate_input, beta_source)?;
    let mut warnings = wacc_warnings(&rate_input, &rate)
        .into_iter()
        .map(|w| format!("[WACC] {w}"))
        .collect::<Vec<_>>();

    if result.metrics.terminal_value_pct > TERMINAL_SHARE_WARNING {
        warnings.push(format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
            result.metrics.terminal_value_pct * 100.0
        ));
    }
    if result.equity_value < 0.0 {
        warnings.push("Equity value is negative: net debt exceeds enterprise value".into());
    }
    Ok(warnings)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn derive_metrics(
    params: &ParameterSet,
    base_fcf: Money,
    forecast: &ForecastCashFlows,
    enterprise_value: Money,
    pv_terminal: Money,
) -> ValuationMetrics {
    let drivers = params.cash_flow_base.drivers();
    let terminal_value_pct = if enterprise_value == 0.0 {
        0.0
    } else {
        pv_terminal / enterprise_value
    };

    ValuationMetrics {
        ebit_margin: drivers.map(|d| d.ebit_margin),
        capex_ratio: drivers.map(|d| d.capex_ratio),
        working_capital_ratio: drivers.map(|d| d.working_capital_ratio),
        value_to_revenue: drivers.map(|d| enterprise_value / d.revenue),
        forecast_cagr: cagr(base_fcf, forecast.terminal_year(), forecast.horizon()).ok(),
        terminal_value_pct,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::parameters::{CashFlowBase, OperatingDrivers};
    use approx::assert_relative_eq;

    fn sample_params() -> ParameterSet {
        let mut p = ParameterSet::with_base_fcf(100.0);
        p.growth_rates = vec![0.10, 0.08, 0.06];
        p.terminal_growth = 0.025;
        p.risk_free_rate = 0.04;
        p.market_risk_premium = 0.05;
        p.beta = Some(1.2);
        p
    }

    fn drivers_params() -> ParameterSet {
        let mut p = sample_params();
        p.cash_flow_base = CashFlowBase::Drivers(OperatingDrivers {
            revenue: 1_000.0,
            ebit_margin: 0.25,
            depreciation_ratio: 0.03,
            capex_ratio: 0.05,
            working_capital_ratio: 0.01,
        });
        p
    }

    #[test]
    fn test_basic_valuation() {
        let out = compute_valuation(&sample_params()).unwrap();
        // WACC = 0.04 + 1.2 * 0.05 = 0.10
        assert_relative_eq!(out.wacc, 0.10, max_relative = 1e-12);
        assert_eq!(out.forecast_cash_flows.horizon(), 3);
        assert_relative_eq!(out.forecast_cash_flows.first_year(), 110.0, max_relative = 1e-12);
        assert!(out.enterprise_value > 0.0);
        assert_eq!(out.equity_value, out.enterprise_value);
        assert_eq!(out.beta_source, BetaSource::Supplied);
        assert!(out.equity_value_per_share.is_none());
    }

    #[test]
    fn test_ev_is_sum_of_parts() {
        let out = compute_valuation(&sample_params()).unwrap();
        let pv_years: f64 = out.discounted_cash_flows.iter().map(|y| y.present_value).sum();
        assert_relative_eq!(
            out.enterprise_value,
            pv_years + out.pv_terminal,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_net_debt_bridge_and_per_share() {
        let mut p = sample_params();
        p.net_debt = 250.0;
        p.shares_outstanding = Some(10.0);
        let out = compute_valuation(&p).unwrap();
        assert_eq!(out.equity_value, out.enterprise_value - 250.0);
        assert_eq!(out.equity_value_per_share, Some(out.equity_value / 10.0));
    }

    #[test]
    fn test_terminal_growth_at_wacc_fails() {
        let mut p = sample_params();
        p.terminal_growth = 0.10;
        let err = compute_valuation(&p).unwrap_err();
        assert_eq!(err.field(), Some("terminal_growth"));
    }

    #[test]
    fn test_invalid_input_short_circuits() {
        let mut p = sample_params();
        p.growth_rates.clear();
        assert!(compute_valuation(&p).is_err());
    }

    #[test]
    fn test_driver_metrics() {
        let out = compute_valuation(&drivers_params()).unwrap();
        let build = out.base_build.as_ref().unwrap();
        // EBIT 250, NOPAT 197.5, +30 -50 -10 = 167.5
        assert_relative_eq!(build.free_cash_flow, 167.5, max_relative = 1e-12);
        assert_relative_eq!(out.base_fcf, 167.5, max_relative = 1e-12);
        assert_eq!(out.metrics.ebit_margin, Some(0.25));
        assert_eq!(out.metrics.capex_ratio, Some(0.05));
        assert_eq!(out.metrics.working_capital_ratio, Some(0.01));
        assert_relative_eq!(
            out.metrics.value_to_revenue.unwrap(),
            out.enterprise_value / 1_000.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_direct_fcf_has_no_revenue_metrics() {
        let out = compute_valuation(&sample_params()).unwrap();
        assert!(out.base_build.is_none());
        assert!(out.metrics.ebit_margin.is_none());
        assert!(out.metrics.value_to_revenue.is_none());
        let cagr = out.metrics.forecast_cagr.unwrap();
        // (1.1 * 1.08 * 1.06)^(1/3) - 1
        assert_relative_eq!(
            cagr,
            (1.1_f64 * 1.08 * 1.06).powf(1.0 / 3.0) - 1.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_tv_percentage_bounds() {
        let out = compute_valuation(&sample_params()).unwrap();
        assert!(out.metrics.terminal_value_pct > 0.0);
        assert!(out.metrics.terminal_value_pct < 1.0);
    }

    #[test]
    fn test_rate_shift_moves_discount_rate_only() {
        let base = compute_valuation(&sample_params()).unwrap();
        assert_eq!(value_with_rate_shift(&sample_params(), 0.0).unwrap(), base);

        // A zero risk-free rate stays valid under a downward shift
        let mut p = sample_params();
        p.risk_free_rate = 0.0;
        let down = value_with_rate_shift(&p, -0.01).unwrap();
        assert_relative_eq!(down.wacc, 0.05, max_relative = 1e-12);
        assert_relative_eq!(down.cost_of_equity, 0.06, max_relative = 1e-12);
        let flat = compute_valuation(&p).unwrap();
        assert!(down.enterprise_value > flat.enterprise_value);
    }

    #[test]
    fn test_rate_shift_below_terminal_growth_fails() {
        let err = value_with_rate_shift(&sample_params(), -0.08).unwrap_err();
        assert_eq!(err.field(), Some("terminal_growth"));
        assert!(value_with_rate_shift(&sample_params(), f64::NAN).is_err());
    }

    #[test]
    fn test_value_with_metadata_warns_on_terminal_share() {
        let out = value_with_metadata(&sample_params()).unwrap();
        assert!(out.methodology.contains("DCF"));
        // Three-year horizon with 2.5% perpetuity growth is TV-heavy
        assert!(out.warnings.iter().any(|w| w.contains("Terminal value represents")));
    }

    #[test]
    fn test_negative_equity_warning() {
        let mut p = sample_params();
        p.net_debt = 1e9;
        let out = value_with_metadata(&p).unwrap();
        assert!(out.result.equity_value < 0.0);
        assert!(out.warnings.iter().any(|w| w.contains("negative")));
    }
}
