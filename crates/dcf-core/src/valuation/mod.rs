pub mod dcf;
pub mod discount;
pub mod parameters;
pub mod projection;
pub mod terminal;
pub mod wacc;

pub use dcf::{compute_valuation, value_with_rate_shift, ValuationMetrics, ValuationResult};
pub use parameters::{CashFlowBase, OperatingDrivers, ParameterSet};
pub use projection::ForecastCashFlows;
