use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

/// Gordon growth terminal value measured at the end of the forecast horizon.
///
/// TV = FCF_n * (1 + g) / (WACC - g)
///
/// Requires WACC > g strictly; otherwise the perpetuity does not converge.
pub fn terminal_value(last_fcf: Money, wacc: Rate, terminal_growth: Rate) -> DcfResult<Money> {
    if !last_fcf.is_finite() || !wacc.is_finite() || !terminal_growth.is_finite() {
        return Err(DcfError::invalid(
            "terminal_growth",
            "Terminal value inputs must be finite",
        ));
    }
    if terminal_growth >= wacc {
        return Err(DcfError::invalid(
            "terminal_growth",
            format!(
                "terminal growth must be below discount rate (terminal growth {terminal_growth}, WACC {wacc})"
            ),
        ));
    }
    Ok(last_fcf * (1.0 + terminal_growth) / (wacc - terminal_growth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gordon_growth() {
        // 100 * 1.03 / (0.09 - 0.03) = 1716.67
        let tv = terminal_value(100.0, 0.09, 0.03).unwrap();
        assert_relative_eq!(tv, 103.0 / 0.06, max_relative = 1e-12);
    }

    #[test]
    fn test_growth_equal_to_wacc_rejected() {
        let err = terminal_value(100.0, 0.03, 0.03).unwrap_err();
        assert_eq!(err.field(), Some("terminal_growth"));
        assert!(err.to_string().contains("terminal growth must be below discount rate"));
    }

    #[test]
    fn test_growth_above_wacc_rejected() {
        assert!(terminal_value(100.0, 0.05, 0.06).is_err());
    }

    #[test]
    fn test_negative_growth_allowed() {
        let tv = terminal_value(100.0, 0.08, -0.02).unwrap();
        assert_relative_eq!(tv, 98.0 / 0.10, max_relative = 1e-12);
    }
}
