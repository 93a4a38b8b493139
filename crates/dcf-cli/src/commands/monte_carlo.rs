use clap::{Args, ValueEnum};
use serde_json::Value;

use dcf_core::monte_carlo::simulation::{self, CancellationToken};
use dcf_core::monte_carlo::{CiMethod, InvalidDrawPolicy, PerturbationDistribution, SimulationConfig};

use super::valuation::ParameterArgs;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CiArg {
    Normal,
    Empirical,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DistributionArg {
    Uniform,
    Normal,
}

/// Flags that override the simulation configuration
#[derive(Args, Debug, Default)]
pub struct SimulationArgs {
    /// Base seed; omit for the default seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Draw the base seed from OS entropy instead
    #[arg(long, conflicts_with = "seed")]
    pub random_seed: bool,

    /// Abort the batch after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Include the raw samples in the output
    #[arg(long)]
    pub keep_samples: bool,

    /// Headline confidence interval
    #[arg(long)]
    pub ci: Option<CiArg>,

    /// Perturbation shape
    #[arg(long)]
    pub distribution: Option<DistributionArg>,

    /// Multiply every perturbation band by this factor
    #[arg(long)]
    pub band_scale: Option<f64>,

    /// Drop invalid draws instead of redrawing them
    #[arg(long)]
    pub exclude_invalid: bool,

    /// Run samples on a single thread
    #[arg(long)]
    pub sequential: bool,
}

impl SimulationArgs {
    pub fn apply(&self, config: &mut SimulationConfig) {
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.random_seed {
            config.seed = None;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        if self.keep_samples {
            config.keep_samples = true;
        }
        if let Some(ci) = self.ci {
            config.ci_method = match ci {
                CiArg::Normal => CiMethod::Normal,
                CiArg::Empirical => CiMethod::Empirical,
            };
        }
        if let Some(dist) = self.distribution {
            config.distribution = match dist {
                DistributionArg::Uniform => PerturbationDistribution::Uniform,
                DistributionArg::Normal => PerturbationDistribution::Normal,
            };
        }
        if let Some(factor) = self.band_scale {
            config.bands = config.bands.scaled(factor);
        }
        if self.exclude_invalid {
            config.invalid_draw_policy = InvalidDrawPolicy::Exclude;
        }
        if self.sequential {
            config.parallel = false;
        }
    }
}

/// Arguments for a Monte Carlo run
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SimulateArgs {
    /// Path to a JSON or YAML parameter file
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub params: ParameterArgs,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params = args.params.load(args.input.as_deref())?;
    let mut config = SimulationConfig::default();
    args.simulation.apply(&mut config);

    let result = simulation::simulate_with_metadata(&params, &config, &CancellationToken::new())?;
    Ok(serde_json::to_value(result)?)
}
