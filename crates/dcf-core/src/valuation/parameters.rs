use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

use super::projection::default_growth_schedule;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_FORECAST_YEARS: u32 = 5;
pub const DEFAULT_TERMINAL_GROWTH: Rate = 0.03;
pub const DEFAULT_RISK_FREE_RATE: Rate = 0.035;
pub const DEFAULT_MARKET_RISK_PREMIUM: Rate = 0.05;
pub const DEFAULT_TAX_RATE: Rate = 0.21;
pub const DEFAULT_COST_OF_DEBT: Rate = 0.05;
pub const DEFAULT_BETA: f64 = 1.0;
pub const DEFAULT_NUM_SIMULATIONS: u32 = 1_000;

fn default_growth_rates() -> Vec<Rate> {
    default_growth_schedule(DEFAULT_FORECAST_YEARS)
}

fn default_terminal_growth() -> Rate {
    DEFAULT_TERMINAL_GROWTH
}

fn default_risk_free_rate() -> Rate {
    DEFAULT_RISK_FREE_RATE
}

fn default_market_risk_premium() -> Rate {
    DEFAULT_MARKET_RISK_PREMIUM
}

fn default_tax_rate() -> Rate {
    DEFAULT_TAX_RATE
}

fn default_cost_of_debt() -> Rate {
    DEFAULT_COST_OF_DEBT
}

fn default_equity_weight() -> f64 {
    1.0
}

fn default_num_simulations() -> u32 {
    DEFAULT_NUM_SIMULATIONS
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Operating drivers from which a base unlevered free cash flow is derived.
/// Every ratio is expressed as a fraction of `revenue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingDrivers {
    /// Base (Year 0) revenue
    pub revenue: Money,
    /// EBIT as a fraction of revenue
    pub ebit_margin: Rate,
    /// Depreciation & amortisation as a fraction of revenue
    #[serde(default)]
    pub depreciation_ratio: Rate,
    /// Capital expenditure as a fraction of revenue
    pub capex_ratio: Rate,
    /// Change in net working capital as a fraction of revenue
    #[serde(default)]
    pub working_capital_ratio: Rate,
}

/// Anchor for the cash flow projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CashFlowBase {
    /// Base-year unlevered free cash flow supplied directly.
    FreeCashFlow { amount: Money },
    /// Base-year UFCF derived from operating drivers.
    Drivers(OperatingDrivers),
}

impl CashFlowBase {
    pub fn drivers(&self) -> Option<&OperatingDrivers> {
        match self {
            CashFlowBase::Drivers(d) => Some(d),
            CashFlowBase::FreeCashFlow { .. } => None,
        }
    }
}

/// Input configuration for a single valuation run (or one simulation batch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Year-by-year FCF growth rates; the length is the forecast horizon.
    #[serde(default = "default_growth_rates")]
    pub growth_rates: Vec<Rate>,
    /// Perpetuity growth rate for the terminal value
    #[serde(default = "default_terminal_growth")]
    pub terminal_growth: Rate,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    #[serde(default = "default_market_risk_premium")]
    pub market_risk_premium: Rate,
    /// Marginal tax rate on operating income
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Rate,
    /// Levered equity beta. When absent, derived from `reference_wacc`, else 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    /// Discount rate of an existing valuation, used to back out an implied beta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_wacc: Option<Rate>,
    pub cash_flow_base: CashFlowBase,
    /// Weight of debt in the capital structure
    #[serde(default)]
    pub debt_weight: f64,
    /// Weight of equity in the capital structure
    #[serde(default = "default_equity_weight")]
    pub equity_weight: f64,
    /// Pre-tax cost of debt
    #[serde(default = "default_cost_of_debt")]
    pub cost_of_debt: Rate,
    /// Debt minus cash, subtracted from enterprise value in the equity bridge
    #[serde(default)]
    pub net_debt: Money,
    /// Diluted shares outstanding for per-share value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<f64>,
    /// Monte Carlo sample count
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
}

impl ParameterSet {
    /// Parameter set with the standard defaults around the given cash flow base.
    pub fn new(cash_flow_base: CashFlowBase) -> Self {
        ParameterSet {
            growth_rates: default_growth_rates(),
            terminal_growth: DEFAULT_TERMINAL_GROWTH,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            market_risk_premium: DEFAULT_MARKET_RISK_PREMIUM,
            tax_rate: DEFAULT_TAX_RATE,
            beta: None,
            reference_wacc: None,
            cash_flow_base,
            debt_weight: 0.0,
            equity_weight: default_equity_weight(),
            cost_of_debt: DEFAULT_COST_OF_DEBT,
            net_debt: 0.0,
            shares_outstanding: None,
            num_simulations: DEFAULT_NUM_SIMULATIONS,
        }
    }

    pub fn with_base_fcf(amount: Money) -> Self {
        Self::new(CashFlowBase::FreeCashFlow { amount })
    }

    /// Explicit forecast horizon in years.
    pub fn forecast_years(&self) -> u32 {
        self.growth_rates.len() as u32
    }

    /// Check every field against its domain. The terminal growth versus WACC
    /// constraint needs the discount rate and is enforced by the terminal value
    /// calculation instead.
    pub fn validate(&self) -> DcfResult<()> {
        if self.growth_rates.is_empty() {
            return Err(DcfError::invalid(
                "growth_rates",
                "At least one forecast year is required",
            ));
        }
        for (i, g) in self.growth_rates.iter().enumerate() {
            if !g.is_finite() || *g < -1.0 {
                return Err(DcfError::invalid(
                    format!("growth_rates[{i}]"),
                    format!("Growth rate must be finite and at least -100%, got {g}"),
                ));
            }
        }

        require_finite("terminal_growth", self.terminal_growth)?;
        if self.terminal_growth <= -1.0 {
            return Err(DcfError::invalid(
                "terminal_growth",
                "Terminal growth must be greater than -100%",
            ));
        }

        require_non_negative("risk_free_rate", self.risk_free_rate)?;
        require_non_negative("market_risk_premium", self.market_risk_premium)?;
        require_finite("tax_rate", self.tax_rate)?;
        if !(0.0..=1.0).contains(&self.tax_rate) {
            return Err(DcfError::invalid(
                "tax_rate",
                "Tax rate must be between 0 and 1",
            ));
        }

        if let Some(beta) = self.beta {
            require_finite("beta", beta)?;
            if beta <= 0.0 {
                return Err(DcfError::invalid("beta", "Beta must be positive"));
            }
        }
        if let Some(reference) = self.reference_wacc {
            require_finite("reference_wacc", reference)?;
        }

        require_non_negative("debt_weight", self.debt_weight)?;
        require_non_negative("equity_weight", self.equity_weight)?;
        if self.debt_weight + self.equity_weight <= 0.0 {
            return Err(DcfError::invalid(
                "debt_weight + equity_weight",
                "Capital structure weights must sum to a positive amount",
            ));
        }
        require_non_negative("cost_of_debt", self.cost_of_debt)?;

        require_finite("net_debt", self.net_debt)?;
        if let Some(shares) = self.shares_outstanding {
            require_finite("shares_outstanding", shares)?;
            if shares <= 0.0 {
                return Err(DcfError::invalid(
                    "shares_outstanding",
                    "Shares outstanding must be positive",
                ));
            }
        }

        validate_cash_flow_base(&self.cash_flow_base)
    }
}

fn validate_cash_flow_base(base: &CashFlowBase) -> DcfResult<()> {
    match base {
        CashFlowBase::FreeCashFlow { amount } => require_finite("cash_flow_base.amount", *amount),
        CashFlowBase::Drivers(d) => {
            require_finite("cash_flow_base.revenue", d.revenue)?;
            if d.revenue <= 0.0 {
                return Err(DcfError::invalid(
                    "cash_flow_base.revenue",
                    "Base revenue must be positive",
                ));
            }
            require_finite("cash_flow_base.ebit_margin", d.ebit_margin)?;
            if !(-1.0..=1.0).contains(&d.ebit_margin) {
                return Err(DcfError::invalid(
                    "cash_flow_base.ebit_margin",
                    "EBIT margin must be between -1 and 1",
                ));
            }
            require_non_negative("cash_flow_base.depreciation_ratio", d.depreciation_ratio)?;
            require_non_negative("cash_flow_base.capex_ratio", d.capex_ratio)?;
            require_finite(
                "cash_flow_base.working_capital_ratio",
                d.working_capital_ratio,
            )
        }
    }
}

fn require_finite(field: &str, value: f64) -> DcfResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DcfError::invalid(field, format!("Must be a finite number, got {value}")))
    }
}

fn require_non_negative(field: &str, value: f64) -> DcfResult<()> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(DcfError::invalid(field, format!("Cannot be negative, got {value}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
