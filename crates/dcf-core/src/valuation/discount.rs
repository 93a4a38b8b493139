use serde::{Deserialize, Serialize};

use crate::time_value::discount_factor;
use crate::types::{Money, Rate};
use crate::DcfResult;

use super::projection::ForecastCashFlows;

/// One discounted forecast year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountedYear {
    /// 1-indexed forecast year
    pub year: u32,
    pub cash_flow: Money,
    pub discount_factor: f64,
    pub present_value: Money,
}

/// Present value of a forecast stream plus its terminal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountedValue {
    pub years: Vec<DiscountedYear>,
    /// Sum of present values of the explicit forecast years
    pub pv_forecast: Money,
    pub terminal_discount_factor: f64,
    pub pv_terminal: Money,
    /// PV(forecast) + PV(terminal)
    pub enterprise_value: Money,
}

/// Discount each year t (1-indexed) by (1 + rate)^t and the terminal value by
/// (1 + rate)^n, n being the forecast horizon.
pub fn discount(
    flows: &ForecastCashFlows,
    terminal_value: Money,
    rate: Rate,
) -> DcfResult<DiscountedValue> {
    let mut years = Vec::with_capacity(flows.horizon() as usize);
    for (idx, &cash_flow) in flows.iter().enumerate() {
        let year = idx as u32 + 1;
        let factor = discount_factor(rate, year)?;
        years.push(DiscountedYear {
            year,
            cash_flow,
            discount_factor: factor,
            present_value: cash_flow * factor,
        });
    }

    let pv_forecast: Money = years.iter().map(|y| y.present_value).sum();
    let terminal_discount_factor = discount_factor(rate, flows.horizon())?;
    let pv_terminal = terminal_value * terminal_discount_factor;

    Ok(DiscountedValue {
        years,
        pv_forecast,
        terminal_discount_factor,
        pv_terminal,
        enterprise_value: pv_forecast + pv_terminal,
    })
}

/// Equity value = EV - net debt
pub fn equity_bridge(enterprise_value: Money, net_debt: Money) -> Money {
    enterprise_value - net_debt
}
