use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::DcfResult;

/// Two-sided 95% normal quantile used for the normal-approximation interval.
pub const Z_95: f64 = 1.96;

const HISTOGRAM_BINS: usize = 20;

/// Percentile summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McPercentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// A single histogram bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Descriptive statistics of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStatistics {
    pub count: u32,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (divisor n - 1)
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// mean +/- 1.96 * std_dev
    pub normal_ci: ConfidenceInterval,
    /// 2.5th / 97.5th percentiles
    pub empirical_ci: ConfidenceInterval,
    pub percentiles: McPercentiles,
    pub histogram: Vec<HistogramBin>,
}

/// Compute the percentile value from a **sorted** slice using linear interpolation.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Build a histogram with `num_bins` equal-width bins over a sorted slice.
fn build_histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];

    // Degenerate distribution: spread within rounding of the sample magnitude
    let scale = min_val.abs().max(max_val.abs()).max(1.0);
    if max_val - min_val <= f64::EPSILON * scale {
        return vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }];
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let n = sorted.len() as f64;

    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| {
            let lower = min_val + i as f64 * bin_width;
            let upper = if i == num_bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            };
            HistogramBin {
                lower,
                upper,
                count: 0,
                frequency: 0.0,
            }
        })
        .collect();

    for &val in sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }

    for bin in &mut bins {
        bin.frequency = bin.count as f64 / n;
    }

    bins
}

/// Summarise a sample given in its original order. Needs at least two finite
/// values for the Bessel-corrected deviation.
///
/// Sums run over deviations from the first sample, so a constant sample has a
/// mean exactly equal to that constant and a deviation of exactly zero.
pub fn summarize(samples: &[f64]) -> DcfResult<SampleStatistics> {
    if samples.len() < 2 {
        return Err(DcfError::invalid(
            "samples",
            format!("At least 2 samples are required, got {}", samples.len()),
        ));
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return Err(DcfError::invalid("samples", "Samples must be finite"));
    }

    let n = samples.len() as f64;
    let shift = samples[0];
    let deviations_sum: f64 = samples.iter().map(|v| v - shift).sum();
    let mean_offset = deviations_sum / n;
    let mean = shift + mean_offset;

    let sum_sq: f64 = samples
        .iter()
        .map(|v| (v - shift - mean_offset).powi(2))
        .sum();
    let std_dev = (sum_sq / (n - 1.0)).sqrt();

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let median = if sorted.len() % 2 == 0 {
        let mid = sorted.len() / 2;
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[sorted.len() / 2]
    };

    let percentiles = McPercentiles {
        p5: percentile_sorted(&sorted, 5.0),
        p10: percentile_sorted(&sorted, 10.0),
        p25: percentile_sorted(&sorted, 25.0),
        p50: percentile_sorted(&sorted, 50.0),
        p75: percentile_sorted(&sorted, 75.0),
        p90: percentile_sorted(&sorted, 90.0),
        p95: percentile_sorted(&sorted, 95.0),
    };

    Ok(SampleStatistics {
        count: sorted.len() as u32,
        mean,
        median,
        std_dev,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        normal_ci: ConfidenceInterval {
            lower: mean - Z_95 * std_dev,
            upper: mean + Z_95 * std_dev,
        },
        empirical_ci: ConfidenceInterval {
            lower: percentile_sorted(&sorted, 2.5),
            upper: percentile_sorted(&sorted, 97.5),
        },
        percentiles,
        histogram: build_histogram(&sorted, HISTOGRAM_BINS),
    })
}
