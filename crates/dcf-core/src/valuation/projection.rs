use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

use super::parameters::{CashFlowBase, OperatingDrivers};

const SCHEDULE_START: Rate = 0.05;
const SCHEDULE_STEP: Rate = 0.005;
const SCHEDULE_FLOOR: Rate = 0.02;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Forecast free cash flows, one per year in chronological order.
///
/// The length is fixed at construction and never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Money>", into = "Vec<Money>")]
pub struct ForecastCashFlows(Vec<Money>);

impl ForecastCashFlows {
    pub fn as_slice(&self) -> &[Money] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Money> {
        self.0.iter()
    }

    pub fn horizon(&self) -> u32 {
        self.0.len() as u32
    }

    /// Cash flow in the final forecast year.
    pub fn terminal_year(&self) -> Money {
        // non-empty by construction
        self.0[self.0.len() - 1]
    }

    pub fn first_year(&self) -> Money {
        self.0[0]
    }
}

impl TryFrom<Vec<Money>> for ForecastCashFlows {
    type Error = DcfError;

    fn try_from(flows: Vec<Money>) -> Result<Self, Self::Error> {
        if flows.is_empty() {
            return Err(DcfError::invalid(
                "forecast_cash_flows",
                "At least one forecast year is required",
            ));
        }
        if let Some(i) = flows.iter().position(|cf| !cf.is_finite()) {
            return Err(DcfError::invalid(
                format!("forecast_cash_flows[{i}]"),
                "Cash flow must be finite",
            ));
        }
        Ok(ForecastCashFlows(flows))
    }
}

impl From<ForecastCashFlows> for Vec<Money> {
    fn from(flows: ForecastCashFlows) -> Self {
        flows.0
    }
}

/// Build-up of the base-year unlevered free cash flow from operating drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UfcfBuild {
    pub revenue: Money,
    pub ebit: Money,
    pub nopat: Money,
    pub plus_depreciation: Money,
    pub less_capex: Money,
    pub less_working_capital_change: Money,
    pub free_cash_flow: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Derive the base-year UFCF:
///
/// UFCF = EBIT * (1 - t) + D&A - CapEx - Delta NWC
pub fn build_base_fcf(drivers: &OperatingDrivers, tax_rate: Rate) -> UfcfBuild {
    let revenue = drivers.revenue;
    let ebit = revenue * drivers.ebit_margin;
    let nopat = ebit * (1.0 - tax_rate);
    let plus_depreciation = revenue * drivers.depreciation_ratio;
    let less_capex = revenue * drivers.capex_ratio;
    let less_working_capital_change = revenue * drivers.working_capital_ratio;
    let free_cash_flow = nopat + plus_depreciation - less_capex - less_working_capital_change;

    UfcfBuild {
        revenue,
        ebit,
        nopat,
        plus_depreciation,
        less_capex,
        less_working_capital_change,
        free_cash_flow,
    }
}

/// Resolve the year-0 anchor of the projection.
pub fn base_free_cash_flow(base: &CashFlowBase, tax_rate: Rate) -> Money {
    match base {
        CashFlowBase::FreeCashFlow { amount } => *amount,
        CashFlowBase::Drivers(d) => build_base_fcf(d, tax_rate).free_cash_flow,
    }
}

/// Compound the base cash flow through the growth schedule.
///
/// `flows[t] = flows[t-1] * (1 + growth_rates[t])` with `flows[-1] = base_fcf`.
pub fn project_cash_flows(base_fcf: Money, growth_rates: &[Rate]) -> DcfResult<ForecastCashFlows> {
    if !base_fcf.is_finite() {
        return Err(DcfError::invalid("base_fcf", "Base cash flow must be finite"));
    }
    if growth_rates.is_empty() {
        return Err(DcfError::invalid(
            "growth_rates",
            "At least one forecast year is required",
        ));
    }

    let mut flows = Vec::with_capacity(growth_rates.len());
    let mut current = base_fcf;
    for (i, g) in growth_rates.iter().enumerate() {
        if !g.is_finite() {
            return Err(DcfError::invalid(
                format!("growth_rates[{i}]"),
                format!("Growth rate must be finite, got {g}"),
            ));
        }
        current *= 1.0 + g;
        flows.push(current);
    }

    ForecastCashFlows::try_from(flows)
}

/// Fallback growth schedule: 5% in year one, stepping down 0.5pp a year to a
/// 2% floor.
pub fn default_growth_schedule(years: u32) -> Vec<Rate> {
    (0..years)
        .map(|i| (SCHEDULE_START - SCHEDULE_STEP * i as f64).max(SCHEDULE_FLOOR))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
