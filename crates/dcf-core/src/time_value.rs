use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

/// Discount factor 1 / (1 + rate)^period for an end-of-period cash flow.
pub fn discount_factor(rate: Rate, period: u32) -> DcfResult<f64> {
    if !rate.is_finite() || rate <= -1.0 {
        return Err(DcfError::invalid(
            "rate",
            format!("Discount rate must be finite and greater than -100%, got {rate}"),
        ));
    }
    Ok(1.0 / (1.0 + rate).powi(period as i32))
}

/// Present value of a single amount received at the end of `period`.
pub fn present_value(amount: Money, rate: Rate, period: u32) -> DcfResult<Money> {
    Ok(amount * discount_factor(rate, period)?)
}

/// Compound annual growth rate between two values over `periods` periods.
pub fn cagr(start_value: Money, end_value: Money, periods: u32) -> DcfResult<Rate> {
    if periods == 0 {
        return Err(DcfError::invalid("periods", "Number of periods must be > 0"));
    }
    if start_value <= 0.0 || !start_value.is_finite() {
        return Err(DcfError::invalid("start_value", "Start value must be positive"));
    }
    if end_value < 0.0 || !end_value.is_finite() {
        return Err(DcfError::invalid(
            "end_value",
            "End value must be finite and non-negative",
        ));
    }
    Ok((end_value / start_value).powf(1.0 / periods as f64) - 1.0)
}
