use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::Rate;
use crate::DcfResult;

use super::parameters::{ParameterSet, DEFAULT_BETA};

/// Where the beta used in the cost of equity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaSource {
    Supplied,
    ImpliedFromReferenceWacc,
    Default,
}

/// Capital-structure and risk inputs for the discount rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRateInput {
    pub risk_free_rate: Rate,
    pub market_risk_premium: Rate,
    /// Levered beta of equity
    pub beta: f64,
    /// Pre-tax cost of debt
    pub cost_of_debt: Rate,
    pub tax_rate: Rate,
    pub debt_weight: f64,
    pub equity_weight: f64,
}

/// Output of the WACC calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub after_tax_cost_of_debt: Rate,
    /// E / (D + E)
    pub equity_share: Rate,
    /// D / (D + E)
    pub debt_share: Rate,
    pub beta: f64,
    pub beta_source: BetaSource,
}

impl DiscountRateInput {
    /// Resolve the beta and collect the discount-rate inputs of a parameter set.
    pub fn from_parameters(params: &ParameterSet) -> DcfResult<(Self, BetaSource)> {
        let (beta, source) = resolve_beta(params)?;
        let input = DiscountRateInput {
            risk_free_rate: params.risk_free_rate,
            market_risk_premium: params.market_risk_premium,
            beta,
            cost_of_debt: params.cost_of_debt,
            tax_rate: params.tax_rate,
            debt_weight: params.debt_weight,
            equity_weight: params.equity_weight,
        };
        Ok((input, source))
    }
}

/// Cost of equity via CAPM: Ke = Rf + Beta * MRP
pub fn cost_of_equity(risk_free_rate: Rate, beta: f64, market_risk_premium: Rate) -> Rate {
    risk_free_rate + beta * market_risk_premium
}

/// Calculate the Weighted Average Cost of Capital.
///
/// WACC = E/(D+E) * Ke + D/(D+E) * Kd * (1 - t)
///
/// Weights need not sum to one; they are normalised by D + E. With no debt the
/// WACC is the cost of equity.
pub fn calculate_wacc(input: &DiscountRateInput, beta_source: BetaSource) -> DcfResult<WaccOutput> {
    validate_discount_rate_input(input)?;

    let total = input.debt_weight + input.equity_weight;
    let equity_share = input.equity_weight / total;
    let debt_share = input.debt_weight / total;

    let cost_of_equity = cost_of_equity(input.risk_free_rate, input.beta, input.market_risk_premium);
    let after_tax_cost_of_debt = input.cost_of_debt * (1.0 - input.tax_rate);

    let wacc = if input.debt_weight == 0.0 {
        cost_of_equity
    } else {
        equity_share * cost_of_equity + debt_share * after_tax_cost_of_debt
    };

    Ok(WaccOutput {
        wacc,
        cost_of_equity,
        after_tax_cost_of_debt,
        equity_share,
        debt_share,
        beta: input.beta,
        beta_source,
    })
}

/// Back out the beta implied by an existing discount rate.
///
/// Beta = (WACC - Rf) / MRP
pub fn implied_beta(wacc: Rate, risk_free_rate: Rate, market_risk_premium: Rate) -> DcfResult<f64> {
    if market_risk_premium == 0.0 {
        return Err(DcfError::invalid(
            "market_risk_premium",
            "Cannot derive beta when the market risk premium is zero",
        ));
    }
    Ok((wacc - risk_free_rate) / market_risk_premium)
}

/// Beta resolution order: supplied beta, then implied from `reference_wacc`,
/// then the 1.0 market default.
pub fn resolve_beta(params: &ParameterSet) -> DcfResult<(f64, BetaSource)> {
    if let Some(beta) = params.beta {
        return Ok((beta, BetaSource::Supplied));
    }
    if let Some(reference) = params.reference_wacc {
        let beta = implied_beta(reference, params.risk_free_rate, params.market_risk_premium)?;
        if !beta.is_finite() || beta <= 0.0 {
            return Err(DcfError::invalid(
                "reference_wacc",
                format!(
                    "Implied beta must be positive, got {beta} (reference WACC must exceed the risk-free rate)"
                ),
            ));
        }
        return Ok((beta, BetaSource::ImpliedFromReferenceWacc));
    }
    Ok((DEFAULT_BETA, BetaSource::Default))
}

/// Reasonableness checks that do not block the valuation.
pub fn wacc_warnings(input: &DiscountRateInput, output: &WaccOutput) -> Vec<String> {
    let mut warnings = Vec::new();
    if output.beta > 3.0 {
        warnings.push(format!(
            "High beta ({}): verify market data; betas above 3.0 are unusual",
            output.beta
        ));
    }
    if input.market_risk_premium > 0.10 {
        warnings.push(format!(
            "Market risk premium ({}) exceeds 10%; verify estimate",
            input.market_risk_premium
        ));
    }
    if output.wacc > 0.20 {
        warnings.push(format!(
            "WACC of {} exceeds 20%; appropriate for high-risk situations only",
            output.wacc
        ));
    }
    warnings
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_discount_rate_input(input: &DiscountRateInput) -> DcfResult<()> {
    let fields = [
        ("risk_free_rate", input.risk_free_rate),
        ("market_risk_premium", input.market_risk_premium),
        ("beta", input.beta),
        ("cost_of_debt", input.cost_of_debt),
        ("tax_rate", input.tax_rate),
        ("debt_weight", input.debt_weight),
        ("equity_weight", input.equity_weight),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(DcfError::invalid(field, format!("Must be a finite number, got {value}")));
        }
    }
    if input.risk_free_rate < 0.0 {
        return Err(DcfError::invalid(
            "risk_free_rate",
            "Risk-free rate cannot be negative",
        ));
    }
    if input.market_risk_premium < 0.0 {
        return Err(DcfError::invalid(
            "market_risk_premium",
            "Market risk premium cannot be negative",
        ));
    }
    if input.beta <= 0.0 {
        return Err(DcfError::invalid("beta", "Beta must be positive"));
    }
    if input.cost_of_debt < 0.0 {
        return Err(DcfError::invalid(
            "cost_of_debt",
            "Cost of debt cannot be negative",
        ));
    }
    if !(0.0..=1.0).contains(&input.tax_rate) {
        return Err(DcfError::invalid(
            "tax_rate",
            "Tax rate must be between 0 and 1",
        ));
    }
    if input.debt_weight < 0.0 || input.equity_weight < 0.0 {
        return Err(DcfError::invalid(
            "debt_weight / equity_weight",
            "Capital structure weights cannot be negative",
        ));
    }
    if input.debt_weight + input.equity_weight <= 0.0 {
        return Err(DcfError::invalid(
            "debt_weight + equity_weight",
            "Capital structure weights must sum to a positive amount",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_input() -> DiscountRateInput {
        DiscountRateInput {
            risk_free_rate: 0.042,
            market_risk_premium: 0.055,
            beta: 1.10,
            cost_of_debt: 0.055,
            tax_rate: 0.21,
            debt_weight: 0.30,
            equity_weight: 0.70,
        }
    }

    #[test]
    fn test_wacc_blended() {
        let out = calculate_wacc(&sample_input(), BetaSource::Supplied).unwrap();
        // Ke = 0.042 + 1.1 * 0.055 = 0.1025
        // Kd_at = 0.055 * 0.79 = 0.04345
        // WACC = 0.7 * 0.1025 + 0.3 * 0.04345 = 0.084785
        assert_relative_eq!(out.cost_of_equity, 0.1025, max_relative = 1e-12);
        assert_relative_eq!(out.after_tax_cost_of_debt, 0.04345, max_relative = 1e-12);
        assert_relative_eq!(out.wacc, 0.084785, max_relative = 1e-12);
    }

    #[test]
    fn test_wacc_weights_normalised() {
        let mut input = sample_input();
        input.debt_weight = 3.0;
        input.equity_weight = 7.0;
        let out = calculate_wacc(&input, BetaSource::Supplied).unwrap();
        assert_relative_eq!(out.wacc, 0.084785, max_relative = 1e-12);
        assert_relative_eq!(out.equity_share, 0.7, max_relative = 1e-12);
    }

    #[test]
    fn test_wacc_no_debt_is_cost_of_equity() {
        let mut input = sample_input();
        input.debt_weight = 0.0;
        input.equity_weight = 1.0;
        let out = calculate_wacc(&input, BetaSource::Supplied).unwrap();
        assert_eq!(out.wacc, out.cost_of_equity);
    }

    #[test]
    fn test_wacc_zero_weights_rejected() {
        let mut input = sample_input();
        input.debt_weight = 0.0;
        input.equity_weight = 0.0;
        let err = calculate_wacc(&input, BetaSource::Supplied).unwrap_err();
        assert_eq!(err.field(), Some("debt_weight + equity_weight"));
    }

    #[test]
    fn test_wacc_negative_tax_rejected() {
        let mut input = sample_input();
        input.tax_rate = -0.01;
        assert!(calculate_wacc(&input, BetaSource::Supplied).is_err());
    }

    #[test]
    fn test_implied_beta_round_trip() {
        let beta = implied_beta(0.09, 0.035, 0.05).unwrap();
        assert_relative_eq!(beta, 1.1, max_relative = 1e-12);
        assert_relative_eq!(
            cost_of_equity(0.035, beta, 0.05),
            0.09,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_implied_beta_zero_mrp() {
        let err = implied_beta(0.09, 0.035, 0.0).unwrap_err();
        assert_eq!(err.field(), Some("market_risk_premium"));
    }

    #[test]
    fn test_resolve_beta_order() {
        let mut params = ParameterSet::with_base_fcf(100.0);
        assert_eq!(resolve_beta(&params).unwrap(), (1.0, BetaSource::Default));

        params.reference_wacc = Some(0.085);
        let (beta, source) = resolve_beta(&params).unwrap();
        assert_relative_eq!(beta, 1.0, max_relative = 1e-12);
        assert_eq!(source, BetaSource::ImpliedFromReferenceWacc);

        params.beta = Some(1.3);
        assert_eq!(resolve_beta(&params).unwrap(), (1.3, BetaSource::Supplied));
    }

    #[test]
    fn test_resolve_beta_reference_below_risk_free() {
        let mut params = ParameterSet::with_base_fcf(100.0);
        params.reference_wacc = Some(0.02);
        let err = resolve_beta(&params).unwrap_err();
        assert_eq!(err.field(), Some("reference_wacc"));
    }

    #[test]
    fn test_wacc_warnings() {
        let mut input = sample_input();
        input.beta = 3.5;
        input.market_risk_premium = 0.12;
        let out = calculate_wacc(&input, BetaSource::Supplied).unwrap();
        let warnings = wacc_warnings(&input, &out);
        assert_eq!(warnings.len(), 3);
    }
}
