//! Chi-square weighted empirical quantiles.
//!
//! For one forecast cell (a target on a date) every ensemble member contributes one value and its
//! weight. Values at or beyond the 10th and 90th percentiles are trimmed together with their
//! weights, the rest are sorted, and the requested quantiles are read off the normalized
//! cumulative weight by linear interpolation.

use crate::forecast::target::ForecastUncertainty;
use crate::log::warn;
use crate::numeric::{interp, mean, quantile_sorted};

const TRIM_LOWER: f64 = 0.1;
const TRIM_UPPER: f64 = 0.9;

/// Quantiles of `data` under `weights`, one value per entry of `quantiles`.
///
/// The result is invariant to scaling all weights by the same positive factor and is
/// non-decreasing in `quantiles` when `quantiles` is. Degenerate cells fall back rather than
/// fail: if no value lies strictly inside the trim band the whole sample is used, and if the
/// remaining weights sum to zero they are treated as equal. Both cases are logged.
#[must_use]
pub fn weighted_quantiles(quantiles: &[f64], data: &[f64], weights: &[f64]) -> Vec<f64> {
    debug_assert_eq!(data.len(), weights.len());
    if data.is_empty() {
        return vec![0.0; quantiles.len()];
    }

    let mut sorted: Vec<f64> = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let lower = quantile_sorted(&sorted, TRIM_LOWER);
    let upper = quantile_sorted(&sorted, TRIM_UPPER);

    let mut kept: Vec<(f64, f64)> = data
        .iter()
        .zip(weights)
        .filter(|(value, _)| **value > lower && **value < upper)
        .map(|(value, weight)| (*value, *weight))
        .collect();
    if kept.is_empty() {
        warn!(
            "no ensemble values strictly inside ({lower}, {upper}); using all {} values",
            data.len()
        );
        kept = data.iter().copied().zip(weights.iter().copied()).collect();
    }
    kept.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: f64 = kept.iter().map(|(_, weight)| weight).sum();
    let uniform = !(total > 0.0 && total.is_finite());
    if uniform {
        warn!(
            "ensemble weights sum to {total} over {} values; weighting them equally",
            kept.len()
        );
    }

    let mut cumulative = 0.0;
    let mut cdf = Vec::with_capacity(kept.len());
    for (i, (_, weight)) in kept.iter().enumerate() {
        if uniform {
            cdf.push((i + 1) as f64 / kept.len() as f64);
        } else {
            cumulative += weight;
            cdf.push(cumulative / total);
        }
    }
    let values: Vec<f64> = kept.iter().map(|(value, _)| *value).collect();

    quantiles.iter().map(|&q| interp(q, &cdf, &values)).collect()
}

/// Widens or keeps the spread of a cell's ensemble values before its quantiles are taken.
/// `steps_ahead` is the horizon label of the cell.
#[must_use]
pub fn adjust_forecast_dist(
    policy: ForecastUncertainty,
    data: &[f64],
    steps_ahead: i64,
) -> Vec<f64> {
    match policy {
        ForecastUncertainty::Default => data.to_vec(),
        ForecastUncertainty::Naive => {
            let center = mean(data);
            let factor = 1.0 + (steps_ahead.max(0) as f64).sqrt();
            data.iter()
                .map(|x| (center + (x - center) * factor).max(0.0))
                .collect()
        }
    }
}
