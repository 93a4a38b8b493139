use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DcfError;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::valuation::dcf::{compute_valuation, value_with_rate_shift};
use crate::valuation::parameters::ParameterSet;
use crate::DcfResult;

use super::config::{CiMethod, InvalidDrawPolicy, SimulationConfig};
use super::perturbation::perturb_parameters;
use super::random::{RandomSource, SeededStreams};
use super::statistics::{summarize, ConfidenceInterval, HistogramBin, McPercentiles};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Shared flag that stops a running batch. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Distribution of equity value across perturbed valuations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub mean: Money,
    pub median: Money,
    /// Sample standard deviation over the valid samples (divisor n - 1)
    pub std_dev: Money,
    /// Headline 95% bounds, taken from the interval selected by `ci_method`
    pub ci_lower: Money,
    pub ci_upper: Money,
    pub ci_method: CiMethod,
    pub normal_ci: ConfidenceInterval,
    pub empirical_ci: ConfidenceInterval,
    pub percentiles: McPercentiles,
    pub min: Money,
    pub max: Money,
    pub histogram: Vec<HistogramBin>,
    /// Samples requested
    pub num_simulations: u32,
    /// Samples that produced a valuation and enter the statistics
    pub valid_samples: u32,
    /// Extra draws taken to replace invalid parameter sets
    pub resampled_draws: u32,
    /// Samples dropped after exhausting the invalid-draw policy
    pub excluded_samples: u32,
    pub seed: Option<u64>,
    /// Equity value of the unperturbed parameter set
    pub base_equity_value: Money,
    /// Raw equity values in sample-index order, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<Money>>,
}

/// Inputs echoed into the output envelope.
#[derive(Serialize)]
pub(crate) struct SimulationAssumptions<'a> {
    pub parameters: &'a ParameterSet,
    pub simulation: &'a SimulationConfig,
}

enum SampleOutcome {
    Valid { equity_value: Money, redraws: u32 },
    Excluded { redraws: u32 },
    Skipped,
}

/// Runs batches of perturbed valuations. Each sample draws from its own
/// stream, so results do not depend on thread scheduling.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator<S = SeededStreams> {
    config: SimulationConfig,
    source: S,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl MonteCarloSimulator<SeededStreams> {
    /// Simulator seeded from `config.seed`, or from OS entropy when it is `None`.
    pub fn new(config: SimulationConfig) -> Self {
        let source = match config.seed {
            Some(seed) => SeededStreams::new(seed),
            None => SeededStreams::from_entropy(),
        };
        MonteCarloSimulator { config, source }
    }
}

impl<S: RandomSource> MonteCarloSimulator<S> {
    /// Swap in a different random source.
    pub fn with_random_source<T: RandomSource>(self, source: T) -> MonteCarloSimulator<T> {
        MonteCarloSimulator {
            config: self.config,
            source,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run `params.num_simulations` perturbed valuations and summarise the
    /// equity values.
    ///
    /// Fails with `InvalidParameter` before sampling when the batch size or
    /// the base case is invalid, and with `Cancelled` when the token fires or
    /// the timeout elapses before every sample has run.
    pub fn run(&self, params: &ParameterSet, token: &CancellationToken) -> DcfResult<MonteCarloResult> {
        self.config.validate()?;
        let n = params.num_simulations;
        self.config.check_simulation_count(n)?;

        let base = compute_valuation(params)?;
        let deadline = self
            .config
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        info!(
            num_simulations = n,
            seed = ?self.source.seed(),
            parallel = self.config.parallel,
            "starting Monte Carlo batch"
        );

        let outcomes: Vec<SampleOutcome> = if self.config.parallel {
            (0..u64::from(n))
                .into_par_iter()
                .map(|i| self.run_sample(params, i, token, deadline))
                .collect::<DcfResult<Vec<_>>>()?
        } else {
            (0..u64::from(n))
                .map(|i| self.run_sample(params, i, token, deadline))
                .collect::<DcfResult<Vec<_>>>()?
        };

        let mut values = Vec::with_capacity(outcomes.len());
        let mut resampled_draws = 0u32;
        let mut excluded_samples = 0u32;
        let mut skipped = 0u32;
        for outcome in outcomes {
            match outcome {
                SampleOutcome::Valid {
                    equity_value,
                    redraws,
                } => {
                    values.push(equity_value);
                    resampled_draws += redraws;
                }
                SampleOutcome::Excluded { redraws } => {
                    excluded_samples += 1;
                    resampled_draws += redraws;
                }
                SampleOutcome::Skipped => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(completed = n - skipped, requested = n, "Monte Carlo batch cancelled");
            return Err(DcfError::Cancelled {
                completed: n - skipped,
                requested: n,
            });
        }
        if excluded_samples > 0 || resampled_draws > 0 {
            warn!(
                excluded_samples,
                resampled_draws, "perturbed parameter sets failed validation"
            );
        }
        if values.len() < 2 {
            return Err(DcfError::invalid(
                "bands",
                format!(
                    "Only {} of {n} perturbed valuations were valid; narrow the perturbation bands",
                    values.len()
                ),
            ));
        }

        let stats = summarize(&values)?;
        let headline = match self.config.ci_method {
            CiMethod::Normal => stats.normal_ci,
            CiMethod::Empirical => stats.empirical_ci,
        };
        debug!(mean = stats.mean, std_dev = stats.std_dev, "Monte Carlo batch summarised");

        Ok(MonteCarloResult {
            mean: stats.mean,
            median: stats.median,
            std_dev: stats.std_dev,
            ci_lower: headline.lower,
            ci_upper: headline.upper,
            ci_method: self.config.ci_method,
            normal_ci: stats.normal_ci,
            empirical_ci: stats.empirical_ci,
            percentiles: stats.percentiles,
            min: stats.min,
            max: stats.max,
            histogram: stats.histogram,
            num_simulations: n,
            valid_samples: stats.count,
            resampled_draws,
            excluded_samples,
            seed: self.source.seed(),
            base_equity_value: base.equity_value,
            samples: self.config.keep_samples.then_some(values),
        })
    }

    /// One sample: perturb, value, and apply the invalid-draw policy.
    fn run_sample(
        &self,
        params: &ParameterSet,
        index: u64,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> DcfResult<SampleOutcome> {
        if token.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(SampleOutcome::Skipped);
        }

        let max_redraws = match self.config.invalid_draw_policy {
            InvalidDrawPolicy::Resample { max_attempts } => max_attempts,
            InvalidDrawPolicy::Exclude => 0,
        };
        let mut rng = self.source.stream(index);
        let mut redraws = 0u32;
        loop {
            let draw = perturb_parameters(
                params,
                &self.config.bands,
                self.config.distribution,
                &mut rng,
            )?;
            match value_with_rate_shift(&draw.params, draw.discount_rate_shift) {
                Ok(valuation) => {
                    return Ok(SampleOutcome::Valid {
                        equity_value: valuation.equity_value,
                        redraws,
                    })
                }
                Err(DcfError::InvalidParameter { .. }) if redraws < max_redraws => redraws += 1,
                Err(DcfError::InvalidParameter { .. }) => {
                    return Ok(SampleOutcome::Excluded { redraws })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Run a Monte Carlo batch with the default configuration (seed 42, default
/// bands, parallel).
pub fn run_monte_carlo(params: &ParameterSet) -> DcfResult<MonteCarloResult> {
    MonteCarloSimulator::new(SimulationConfig::default()).run(params, &CancellationToken::new())
}

/// Monte Carlo batch wrapped in the standard output envelope.
pub fn simulate_with_metadata(
    params: &ParameterSet,
    config: &SimulationConfig,
    token: &CancellationToken,
) -> DcfResult<ComputationOutput<MonteCarloResult>> {
    let start = Instant::now();
    let result = MonteCarloSimulator::new(config.clone()).run(params, token)?;

    let mut warnings = Vec::new();
    if result.excluded_samples > 0 {
        warnings.push(format!(
            "{} of {} samples were excluded after failing validation",
            result.excluded_samples, result.num_simulations
        ));
    }
    if result.resampled_draws > 0 {
        warnings.push(format!(
            "{} perturbed parameter sets were redrawn after failing validation",
            result.resampled_draws
        ));
    }
    if config.ci_method == CiMethod::Normal {
        warnings.push(
            "Confidence interval uses the normal approximation (mean +/- 1.96 std); see empirical_ci for percentile bounds"
                .into(),
        );
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monte Carlo DCF (perturbed growth, WACC shift, margins and terminal growth)",
        &SimulationAssumptions {
            parameters: params,
            simulation: config,
        },
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
