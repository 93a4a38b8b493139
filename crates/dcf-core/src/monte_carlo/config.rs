use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::Rate;
use crate::DcfResult;

/// Smallest batch the simulator will run.
pub const MIN_SIMULATIONS: u32 = 100;
/// Default ceiling on the batch size.
pub const DEFAULT_MAX_SIMULATIONS: u32 = 10_000;
/// Seed used when the caller does not pick one, so runs are reproducible by default.
pub const DEFAULT_SEED: u64 = 42;

fn default_seed() -> Option<u64> {
    Some(DEFAULT_SEED)
}

fn default_max_simulations() -> u32 {
    DEFAULT_MAX_SIMULATIONS
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    10
}

/// Half-widths (uniform) or standard deviations (normal) of the perturbation
/// applied to each uncertain input, in absolute rate terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationBands {
    /// Band on the first forecast year's growth rate
    pub growth_rate_near: Rate,
    /// Band on the last forecast year's growth rate; intermediate years interpolate
    pub growth_rate_far: Rate,
    /// Shift added to the computed WACC; the rate inputs themselves are left alone
    pub discount_rate: Rate,
    pub ebit_margin: Rate,
    pub capex_ratio: Rate,
    pub terminal_growth: Rate,
}

impl Default for PerturbationBands {
    fn default() -> Self {
        PerturbationBands {
            growth_rate_near: 0.01,
            growth_rate_far: 0.02,
            discount_rate: 0.01,
            ebit_margin: 0.02,
            capex_ratio: 0.01,
            terminal_growth: 0.005,
        }
    }
}

impl PerturbationBands {
    /// No perturbation: every draw reproduces the base case.
    pub fn zero() -> Self {
        PerturbationBands {
            growth_rate_near: 0.0,
            growth_rate_far: 0.0,
            discount_rate: 0.0,
            ebit_margin: 0.0,
            capex_ratio: 0.0,
            terminal_growth: 0.0,
        }
    }

    /// Scale every band by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        PerturbationBands {
            growth_rate_near: self.growth_rate_near * factor,
            growth_rate_far: self.growth_rate_far * factor,
            discount_rate: self.discount_rate * factor,
            ebit_margin: self.ebit_margin * factor,
            capex_ratio: self.capex_ratio * factor,
            terminal_growth: self.terminal_growth * factor,
        }
    }

    /// Band for forecast year `year_idx` (0-based) of a `horizon`-year forecast.
    pub fn growth_band(&self, year_idx: usize, horizon: usize) -> Rate {
        if horizon <= 1 {
            return self.growth_rate_near;
        }
        let t = year_idx as f64 / (horizon - 1) as f64;
        self.growth_rate_near + (self.growth_rate_far - self.growth_rate_near) * t
    }

    fn validate(&self) -> DcfResult<()> {
        let fields = [
            ("bands.growth_rate_near", self.growth_rate_near),
            ("bands.growth_rate_far", self.growth_rate_far),
            ("bands.discount_rate", self.discount_rate),
            ("bands.ebit_margin", self.ebit_margin),
            ("bands.capex_ratio", self.capex_ratio),
            ("bands.terminal_growth", self.terminal_growth),
        ];
        for (field, band) in fields {
            if !band.is_finite() || band < 0.0 {
                return Err(DcfError::invalid(
                    field,
                    format!("Perturbation band must be finite and non-negative, got {band}"),
                ));
            }
        }
        Ok(())
    }
}

/// Shape of the perturbation around each base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationDistribution {
    /// Uniform on [base - band, base + band]
    #[default]
    Uniform,
    /// Normal with mean = base and standard deviation = band
    Normal,
}

/// What to do with a draw whose perturbed parameters fail validation
/// (for example terminal growth at or above the perturbed WACC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum InvalidDrawPolicy {
    /// Redraw from the same sample stream up to `max_attempts` times, then exclude.
    Resample {
        #[serde(default = "default_max_attempts")]
        max_attempts: u32,
    },
    /// Drop the sample and count it.
    Exclude,
}

impl Default for InvalidDrawPolicy {
    fn default() -> Self {
        InvalidDrawPolicy::Resample {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Which interval is reported as the headline 95% confidence bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiMethod {
    /// mean +/- 1.96 * std
    #[default]
    Normal,
    /// 2.5th and 97.5th percentiles of the samples
    Empirical,
}

/// Monte Carlo run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Base seed; `None` draws one from entropy (reported back in the result).
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub bands: PerturbationBands,
    #[serde(default)]
    pub distribution: PerturbationDistribution,
    #[serde(default)]
    pub invalid_draw_policy: InvalidDrawPolicy,
    /// Ceiling on `num_simulations`
    #[serde(default = "default_max_simulations")]
    pub max_simulations: u32,
    /// Abort the batch once this many milliseconds have elapsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Return the raw equity-value samples in sample-index order
    #[serde(default)]
    pub keep_samples: bool,
    #[serde(default)]
    pub ci_method: CiMethod,
    /// Spread samples over the rayon thread pool
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Set to false to skip the simulation in a combined analysis
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: default_seed(),
            bands: PerturbationBands::default(),
            distribution: PerturbationDistribution::default(),
            invalid_draw_policy: InvalidDrawPolicy::default(),
            max_simulations: DEFAULT_MAX_SIMULATIONS,
            timeout_ms: None,
            keep_samples: false,
            ci_method: CiMethod::default(),
            parallel: true,
            enabled: true,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> DcfResult<()> {
        if self.max_simulations < MIN_SIMULATIONS {
            return Err(DcfError::invalid(
                "max_simulations",
                format!("Ceiling must be at least {MIN_SIMULATIONS}"),
            ));
        }
        self.bands.validate()
    }

    /// Reject batch sizes outside [MIN_SIMULATIONS, max_simulations].
    pub fn check_simulation_count(&self, num_simulations: u32) -> DcfResult<()> {
        if num_simulations < MIN_SIMULATIONS || num_simulations > self.max_simulations {
            return Err(DcfError::invalid(
                "num_simulations",
                format!(
                    "Must be between {MIN_SIMULATIONS} and {}, got {num_simulations}",
                    self.max_simulations
                ),
            ));
        }
        Ok(())
    }
}
