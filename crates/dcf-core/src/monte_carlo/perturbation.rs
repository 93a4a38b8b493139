use rand::Rng;
use statrs::distribution::{Normal, Uniform};

use crate::error::DcfError;
use crate::types::Rate;
use crate::valuation::parameters::{CashFlowBase, ParameterSet};
use crate::DcfResult;

use super::config::{PerturbationBands, PerturbationDistribution};

/// Draw one value around `base`. A zero band returns `base` untouched.
fn draw<R: Rng>(
    rng: &mut R,
    base: f64,
    band: f64,
    distribution: PerturbationDistribution,
) -> DcfResult<f64> {
    if band == 0.0 {
        return Ok(base);
    }
    match distribution {
        PerturbationDistribution::Uniform => {
            let (low, high) = (base - band, base + band);
            // Band below the resolution of `base`
            if low >= high {
                return Ok(base);
            }
            let u = Uniform::new(low, high).map_err(|e| {
                DcfError::invalid("bands", format!("Invalid Uniform parameters: {e}"))
            })?;
            Ok(rng.sample(u))
        }
        PerturbationDistribution::Normal => {
            let n = Normal::new(base, band).map_err(|e| {
                DcfError::invalid("bands", format!("Invalid Normal parameters: {e}"))
            })?;
            Ok(rng.sample(n))
        }
    }
}

/// One Monte Carlo draw: perturbed inputs plus the shift applied to the
/// computed discount rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PerturbedDraw {
    pub params: ParameterSet,
    pub discount_rate_shift: Rate,
}

/// Produce a perturbed copy of `base`, drawing each uncertain input
/// independently. Draw order is fixed so a given stream always yields the
/// same draw.
///
/// The discount-rate draw is carried as a shift on the computed WACC rather
/// than applied to the risk-free rate or cost of debt, so a low base rate
/// never leaves its valid domain.
pub fn perturb_parameters<R: Rng>(
    base: &ParameterSet,
    bands: &PerturbationBands,
    distribution: PerturbationDistribution,
    rng: &mut R,
) -> DcfResult<PerturbedDraw> {
    let mut params = base.clone();

    let horizon = base.growth_rates.len();
    for (i, g) in params.growth_rates.iter_mut().enumerate() {
        *g = draw(rng, *g, bands.growth_band(i, horizon), distribution)?;
    }

    let discount_rate_shift = draw(rng, 0.0, bands.discount_rate, distribution)?;

    params.terminal_growth = draw(rng, base.terminal_growth, bands.terminal_growth, distribution)?;

    if let CashFlowBase::Drivers(ref mut drivers) = params.cash_flow_base {
        drivers.ebit_margin = draw(rng, drivers.ebit_margin, bands.ebit_margin, distribution)?;
        drivers.capex_ratio = draw(rng, drivers.capex_ratio, bands.capex_ratio, distribution)?;
    }

    Ok(PerturbedDraw {
        params,
        discount_rate_shift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::random::{RandomSource, SeededStreams};
    use crate::valuation::parameters::OperatingDrivers;

    fn drivers_params() -> ParameterSet {
        ParameterSet::new(CashFlowBase::Drivers(OperatingDrivers {
            revenue: 1_000.0,
            ebit_margin: 0.20,
            depreciation_ratio: 0.03,
            capex_ratio: 0.05,
            working_capital_ratio: 0.01,
        }))
    }

    #[test]
    fn test_zero_bands_reproduce_base() {
        let base = drivers_params();
        let mut rng = SeededStreams::new(1).stream(0);
        let p = perturb_parameters(
            &base,
            &PerturbationBands::zero(),
            PerturbationDistribution::Uniform,
            &mut rng,
        )
        .unwrap();
        assert_eq!(p.params, base);
        assert_eq!(p.discount_rate_shift, 0.0);
    }

    #[test]
    fn test_uniform_draws_stay_in_band() {
        let base = drivers_params();
        let bands = PerturbationBands::default();
        let source = SeededStreams::new(11);
        for i in 0..500 {
            let mut rng = source.stream(i);
            let PerturbedDraw {
                params: p,
                discount_rate_shift,
            } = perturb_parameters(&base, &bands, PerturbationDistribution::Uniform, &mut rng)
                .unwrap();
            for (y, (g, g0)) in p.growth_rates.iter().zip(&base.growth_rates).enumerate() {
                assert!((g - g0).abs() <= bands.growth_band(y, 5) + 1e-12);
            }
            assert!((p.terminal_growth - base.terminal_growth).abs() <= 0.005 + 1e-12);
            assert!(discount_rate_shift.abs() <= 0.01 + 1e-12);
            assert_eq!(p.risk_free_rate, base.risk_free_rate);
            assert_eq!(p.cost_of_debt, base.cost_of_debt);
            let d = p.cash_flow_base.drivers().unwrap();
            assert!((d.ebit_margin - 0.20).abs() <= 0.02 + 1e-12);
            assert!((d.capex_ratio - 0.05).abs() <= 0.01 + 1e-12);
            assert_eq!(d.revenue, 1_000.0);
        }
    }

    #[test]
    fn test_same_stream_same_draw() {
        let base = drivers_params();
        let bands = PerturbationBands::default();
        let source = SeededStreams::new(5);
        let a = perturb_parameters(&base, &bands, PerturbationDistribution::Normal, &mut source.stream(9))
            .unwrap();
        let b = perturb_parameters(&base, &bands, PerturbationDistribution::Normal, &mut source.stream(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rate_inputs_untouched_by_discount_shift() {
        let mut base = ParameterSet::with_base_fcf(100.0);
        base.risk_free_rate = 0.0;
        base.reference_wacc = Some(0.09);
        let mut bands = PerturbationBands::zero();
        bands.discount_rate = 0.01;
        let source = SeededStreams::new(3);
        let mut negative = 0;
        for i in 0..200 {
            let d = perturb_parameters(&base, &bands, PerturbationDistribution::Uniform, &mut source.stream(i))
                .unwrap();
            assert_eq!(d.params, base);
            assert!(d.discount_rate_shift.abs() <= 0.01);
            if d.discount_rate_shift < 0.0 {
                negative += 1;
            }
        }
        // Two-sided around zero
        assert!(negative > 50 && negative < 150);
    }

    #[test]
    fn test_sub_ulp_band_returns_base() {
        let base = drivers_params();
        let bands = PerturbationBands::default().scaled(1e-18);
        let mut rng = SeededStreams::new(8).stream(0);
        let d = perturb_parameters(&base, &bands, PerturbationDistribution::Uniform, &mut rng)
            .unwrap();
        assert_eq!(d.params.growth_rates, base.growth_rates);
        assert_eq!(d.params.terminal_growth, base.terminal_growth);
        assert_eq!(d.params.cash_flow_base, base.cash_flow_base);
    }
}
