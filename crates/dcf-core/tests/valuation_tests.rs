use approx::assert_relative_eq;
use dcf_core::valuation::parameters::{CashFlowBase, OperatingDrivers, ParameterSet};
use dcf_core::valuation::terminal::terminal_value;
use dcf_core::valuation::wacc::BetaSource;
use dcf_core::valuation::{compute_valuation, dcf};
use dcf_core::DcfError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn reference_params() -> ParameterSet {
    let mut p = ParameterSet::with_base_fcf(30e9);
    p.growth_rates = vec![0.05, 0.04, 0.04, 0.03, 0.03];
    p.terminal_growth = 0.03;
    p.risk_free_rate = 0.035;
    p.market_risk_premium = 0.05;
    p.beta = Some(1.1);
    p.tax_rate = 0.21;
    p.debt_weight = 0.0;
    p.equity_weight = 1.0;
    p
}

// ===========================================================================
// Reference scenario
// ===========================================================================

#[test]
fn test_reference_scenario_hand_computed() {
    let result = compute_valuation(&reference_params()).unwrap();

    // Ke = 0.035 + 1.1 * 0.05
    assert_relative_eq!(result.wacc, 0.09, max_relative = 1e-12);
    assert_eq!(result.beta_source, BetaSource::Supplied);

    let expected_flows = [
        31.5e9,
        32.76e9,
        34.0704e9,
        35.092_512e9,
        36.145_287_36e9,
    ];
    for (got, want) in result.forecast_cash_flows.iter().zip(expected_flows) {
        assert_relative_eq!(*got, want, max_relative = 1e-12);
    }

    // TV = 36.14528736e9 * 1.03 / 0.06
    assert_relative_eq!(result.terminal_value, 620_494_099_680.0, max_relative = 1e-6);
    assert_relative_eq!(result.pv_forecast, 131_133_496_129.737, max_relative = 1e-6);
    assert_relative_eq!(result.pv_terminal, 403_278_590_394.966, max_relative = 1e-6);
    assert_relative_eq!(result.enterprise_value, 534_412_086_524.703, max_relative = 1e-6);
    assert_eq!(result.equity_value, result.enterprise_value);
}

#[test]
fn test_reference_metrics_without_drivers() {
    let result = compute_valuation(&reference_params()).unwrap();
    assert_eq!(result.metrics.ebit_margin, None);
    assert_eq!(result.metrics.value_to_revenue, None);
    assert!(result.base_build.is_none());
    assert_relative_eq!(
        result.metrics.terminal_value_pct,
        result.pv_terminal / result.enterprise_value
    );
    // (36.14528736 / 30)^(1/5) - 1
    let cagr = result.metrics.forecast_cagr.unwrap();
    assert_relative_eq!(cagr, (36.145_287_36_f64 / 30.0).powf(0.2) - 1.0, max_relative = 1e-9);
}

#[test]
fn test_deterministic_output() {
    let params = reference_params();
    let a = compute_valuation(&params).unwrap();
    let b = compute_valuation(&params).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.enterprise_value.to_bits(), b.enterprise_value.to_bits());
}

// ===========================================================================
// Terminal growth constraint
// ===========================================================================

#[test]
fn test_wacc_equal_to_terminal_growth_fails() {
    let mut p = reference_params();
    p.risk_free_rate = 0.03;
    p.market_risk_premium = 0.0;
    p.beta = Some(1.0);
    let err = compute_valuation(&p).unwrap_err();
    match err {
        DcfError::InvalidParameter { field, .. } => assert_eq!(field, "terminal_growth"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_wacc_above_terminal_growth_succeeds() {
    let mut p = reference_params();
    p.risk_free_rate = 0.03;
    p.market_risk_premium = 0.05;
    p.beta = Some(1.0);
    let result = compute_valuation(&p).unwrap();
    assert_relative_eq!(result.wacc, 0.08, max_relative = 1e-12);
    assert!(result.terminal_value > 0.0);
}

#[test]
fn test_terminal_value_direct() {
    assert!(terminal_value(100.0, 0.03, 0.03).is_err());
    assert!(terminal_value(100.0, 0.02, 0.03).is_err());
    assert_relative_eq!(terminal_value(100.0, 0.08, 0.03).unwrap(), 2060.0, max_relative = 1e-12);
}

// ===========================================================================
// Input validation
// ===========================================================================

#[test]
fn test_empty_growth_rates_rejected() {
    let mut p = reference_params();
    p.growth_rates.clear();
    let err = compute_valuation(&p).unwrap_err();
    assert_eq!(err.field(), Some("growth_rates"));
}

#[test]
fn test_non_finite_growth_rejected() {
    let mut p = reference_params();
    p.growth_rates[2] = f64::NAN;
    let err = compute_valuation(&p).unwrap_err();
    assert_eq!(err.field(), Some("growth_rates[2]"));
}

#[test]
fn test_zero_capital_structure_rejected() {
    let mut p = reference_params();
    p.equity_weight = 0.0;
    p.debt_weight = 0.0;
    assert!(compute_valuation(&p).is_err());
}

#[test]
fn test_tax_rate_out_of_range_rejected() {
    let mut p = reference_params();
    p.tax_rate = 1.5;
    assert_eq!(compute_valuation(&p).unwrap_err().field(), Some("tax_rate"));
}

// ===========================================================================
// Drivers, equity bridge, envelope
// ===========================================================================

#[test]
fn test_drivers_base_and_per_share_value() {
    let mut p = ParameterSet::new(CashFlowBase::Drivers(OperatingDrivers {
        revenue: 400e9,
        ebit_margin: 0.30,
        depreciation_ratio: 0.03,
        capex_ratio: 0.03,
        working_capital_ratio: 0.0,
    }));
    p.net_debt = 50e9;
    p.shares_outstanding = Some(15e9);

    let result = compute_valuation(&p).unwrap();
    let build = result.base_build.as_ref().unwrap();
    // NOPAT = 400e9 * 0.30 * (1 - 0.21); D&A and capex cancel
    assert_relative_eq!(build.nopat, 94.8e9, max_relative = 1e-12);
    assert_relative_eq!(result.base_fcf, build.free_cash_flow);
    assert_relative_eq!(result.equity_value, result.enterprise_value - 50e9);
    assert_relative_eq!(result.equity_value_per_share.unwrap(), result.equity_value / 15e9);
    assert_eq!(result.metrics.ebit_margin, Some(0.30));
    assert_relative_eq!(
        result.metrics.value_to_revenue.unwrap(),
        result.enterprise_value / 400e9
    );
    // Default schedule steps down from 5%
    assert_eq!(p.forecast_years(), 5);
    assert_relative_eq!(p.growth_rates[0], 0.05);
}

#[test]
fn test_envelope_and_warnings() {
    let out = dcf::value_with_metadata(&reference_params()).unwrap();
    assert_eq!(out.metadata.precision, "ieee754_f64");
    assert!(!out.methodology.is_empty());
    // Terminal value is ~75% of EV in the reference case
    assert!(out
        .warnings
        .iter()
        .any(|w| w.contains("Terminal value represents")));
    assert_eq!(out.assumptions["growth_rates"].as_array().unwrap().len(), 5);
}

#[test]
fn test_parameters_from_json_defaults() {
    let json = r#"{ "cash_flow_base": { "type": "free_cash_flow", "amount": 100.0 } }"#;
    let params: ParameterSet = serde_json::from_str(json).unwrap();
    assert_eq!(params.risk_free_rate, 0.035);
    assert_eq!(params.market_risk_premium, 0.05);
    assert_eq!(params.tax_rate, 0.21);
    assert_eq!(params.terminal_growth, 0.03);
    assert_eq!(params.num_simulations, 1000);
    let result = compute_valuation(&params).unwrap();
    assert_eq!(result.beta_source, BetaSource::Default);
}

// ===========================================================================
// Properties
// ===========================================================================

fn arb_params() -> impl Strategy<Value = ParameterSet> {
    (
        1e6f64..1e12,
        prop::collection::vec(-0.2f64..0.3, 1..10),
        -0.02f64..0.03,
        0.02f64..0.06,
        0.5f64..2.0,
        -1e9f64..1e9,
    )
        .prop_map(|(fcf, growth, g, rf, beta, net_debt)| {
            let mut p = ParameterSet::with_base_fcf(fcf);
            p.growth_rates = growth;
            p.terminal_growth = g;
            p.risk_free_rate = rf;
            p.beta = Some(beta);
            p.net_debt = net_debt;
            p
        })
}

proptest! {
    #[test]
    fn prop_ev_is_sum_of_discounted_parts(p in arb_params()) {
        let r = compute_valuation(&p).unwrap();
        let forecast: f64 = r.discounted_cash_flows.iter().map(|y| y.present_value).sum();
        let tv_pv = r.terminal_value / (1.0 + r.wacc).powi(p.growth_rates.len() as i32);
        let expected = forecast + tv_pv;
        prop_assert!(((r.enterprise_value - expected) / expected).abs() < 1e-9);
        prop_assert_eq!(r.forecast_cash_flows.horizon() as usize, p.growth_rates.len());
    }

    #[test]
    fn prop_zero_net_debt_equity_equals_ev(mut p in arb_params()) {
        p.net_debt = 0.0;
        let r = compute_valuation(&p).unwrap();
        prop_assert_eq!(r.equity_value, r.enterprise_value);
    }

    #[test]
    fn prop_higher_terminal_growth_raises_value(p in arb_params()) {
        let mut higher = p.clone();
        higher.terminal_growth += 0.005;
        let base = compute_valuation(&p).unwrap();
        let up = compute_valuation(&higher).unwrap();
        prop_assert!(up.enterprise_value > base.enterprise_value);
    }
}
