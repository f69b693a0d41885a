//! Floating point helpers shared by the forecast and demographic engines.
//!
//! `almost_eq` is vendored from [statrs@0.18.0 (prec.rs)](http://github.com/statrs-dev/statrs/blob/v0.18.0/src/prec.rs),
//! a convenience wrapper around the approx crate. The interpolation and quantile routines follow
//! the conventions of numpy's `interp` and `quantile` (linear method), which is what fitted model
//! outputs and submission checks are compared against.

use approx::AbsDiffEq;

/// Targeted accuracy instantiated over `f64`
pub const ACC: f64 = 10e-11;

/// Compares if two floats are close via `approx::abs_diff_eq` using a maximum absolute difference
/// (epsilon) of `acc`.
#[must_use]
pub fn almost_eq(a: f64, b: f64, acc: f64) -> bool {
    if a.is_infinite() && b.is_infinite() {
        return a == b;
    }
    a.abs_diff_eq(&b, acc)
}

/// One-dimensional piecewise-linear interpolation of `x` against the increasing sample points
/// `xp` with values `fp`. Points left of `xp[0]` take `fp[0]` and points right of the last sample
/// take the last value. Returns `NaN` when there are no sample points.
#[must_use]
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    let n = xp.len().min(fp.len());
    if n == 0 || x.is_nan() {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // xp[j] <= x < xp[j + 1]
    let j = xp[..n].partition_point(|&v| v <= x) - 1;
    let (x0, x1) = (xp[j], xp[j + 1]);
    let (y0, y1) = (fp[j], fp[j + 1]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Interpolates every point of `xs`; see [`interp`].
#[must_use]
pub fn interp_many(xs: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| interp(x, xp, fp)).collect()
}

/// The `q`-th quantile of `sorted`, which must be in ascending order, using linear interpolation
/// between order statistics.
#[must_use]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

/// First difference with a leading zero, so the output has the same length as the input.
#[must_use]
pub fn diff_with_leading_zero(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(0.0);
    }
    out.extend(values.windows(2).map(|w| w[1] - w[0]));
    out
}

/// Divides `numerator` by `denominator`, treating an empty denominator as contributing nothing.
#[must_use]
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[must_use]
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_almost_eq;

    #[test]
    fn almost_eq_within_tolerance() {
        assert!(almost_eq(1.0, 1.0 + 0.5e-11, ACC));
        assert!(!almost_eq(1.0, 1.0 + 2e-10, ACC));
        assert!(almost_eq(f64::INFINITY, f64::INFINITY, ACC));
        assert!(!almost_eq(f64::INFINITY, f64::NEG_INFINITY, ACC));
    }

    #[test]
    fn interp_matches_numpy_semantics() {
        let xp = [0.0, 1.0, 3.0];
        let fp = [10.0, 20.0, 0.0];
        assert_eq!(interp(-5.0, &xp, &fp), 10.0);
        assert_eq!(interp(0.0, &xp, &fp), 10.0);
        assert_almost_eq!(interp(0.25, &xp, &fp), 12.5, ACC);
        assert_eq!(interp(1.0, &xp, &fp), 20.0);
        assert_almost_eq!(interp(2.0, &xp, &fp), 10.0, ACC);
        assert_eq!(interp(7.0, &xp, &fp), 0.0);
        assert!(interp(1.0, &[], &[]).is_nan());
    }

    #[test]
    fn interp_with_repeated_sample_points_is_finite() {
        // A flat stretch of a CDF produces repeated sample points.
        let xp = [0.0, 0.5, 0.5, 1.0];
        let fp = [1.0, 2.0, 3.0, 4.0];
        for x in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert!(interp(x, &xp, &fp).is_finite());
        }
        assert_eq!(interp(0.5, &xp, &fp), 3.0);
    }

    #[test]
    fn quantile_linear_method() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&data, 0.0), 1.0);
        assert_eq!(quantile_sorted(&data, 0.5), 3.0);
        assert_eq!(quantile_sorted(&data, 1.0), 5.0);
        assert_almost_eq!(quantile_sorted(&data, 0.1), 1.4, 1e-12);
        assert_almost_eq!(quantile_sorted(&data, 0.9), 4.6, 1e-12);
        assert_eq!(quantile_sorted(&[7.0], 0.3), 7.0);
        assert!(quantile_sorted(&[], 0.3).is_nan());
    }

    #[test]
    fn diff_keeps_length() {
        assert_eq!(diff_with_leading_zero(&[1.0, 3.0, 6.0]), vec![0.0, 2.0, 3.0]);
        assert!(diff_with_leading_zero(&[]).is_empty());
    }

    #[test]
    fn ratio_or_zero_handles_empty_pools() {
        assert_eq!(ratio_or_zero(3.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(3.0, 2.0), 1.5);
    }

    #[test]
    fn assert_almost_eq_macro_passes() {
        assert_almost_eq!(3.14159265, 3.14159264, 1e-7);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn assert_almost_eq_macro_panics() {
        assert_almost_eq!(1.0, 1.001, 1e-4);
    }
}
