//! Cross-correlation with sub-pixel refinement
//!
//! **Algorithm**:
//! 1. Mean-normalize both series
//! 2. Coarse stage: evaluate the match metric at every integer lag within
//!    the search range, spline-interpolate the lag curve at 0.01 px and
//!    take its extremum
//! 3. Fine stage: apply Fourier fractional shifts around the coarse lag in
//!    0.1 px steps, re-evaluate the metric over the range-trimmed overlap,
//!    spline-interpolate at 0.001 px
//!
//! The trimmed overlap leaves `lag_range` pixels of overhang at each end so
//! every trial lag compares the same number of samples.

use super::shift::FourierShifter;
use super::spline::CubicSpline;
use tracing::{trace, warn};

/// Match metric for the lag search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMetric {
    /// Sum of squared differences, minimized
    SquaredDifference,
    /// Sum of absolute products, maximized
    Product,
}

/// Half-width of the fine search around the coarse lag, in pixels
pub const FINE_HALF_WIDTH_PIXELS: f64 = 5.0;

/// Step of the fine trial shifts, in pixels
const FINE_STEP_PIXELS: f64 = 0.1;

/// Sampling resolution of the coarse interpolated lag curve, in pixels
const COARSE_RESOLUTION: f64 = 0.01;

/// Sampling resolution of the fine interpolated lag curve, in pixels
const FINE_RESOLUTION: f64 = 0.001;

/// Measure the pixel shift of `star` relative to `template`.
///
/// # Arguments
/// * `star` - Observed flux over one correlation window
/// * `template` - Template flux over the same window
/// * `lag_range` - Integer lag search half-width in pixels
/// * `metric` - Match metric
///
/// # Returns
/// The sub-pixel shift, or None when the search failed for this window
/// (shift beyond the search range, or window too short).
pub fn cross_correlate(
    star: &[f64],
    template: &[f64],
    lag_range: usize,
    metric: CorrelationMetric,
) -> Option<f64> {
    let ls = star.len();
    let ln = template.len();
    let length = ls.min(ln);
    if lag_range > (length.saturating_sub(1)) / 2 {
        warn!(
            length,
            lag_range, "window too short for requested lag range"
        );
        return None;
    }

    let range = lag_range as i64;
    let trimmed = length - 2 * lag_range;
    let trim_end = lag_range + trimmed; // Exclusive

    // Mean-normalize both series
    let te: Vec<f64> = normalize_by_mean(template);
    let st: Vec<f64> = normalize_by_mean(star);

    // Coarse stage: metric at every integer lag
    let mut lags = Vec::with_capacity(2 * lag_range + 1);
    let mut curve = Vec::with_capacity(2 * lag_range + 1);
    for j in -range..=range {
        let mut sum = 0.0;
        for i in lag_range..trim_end {
            let s = st[(i as i64 + j) as usize];
            sum += match metric {
                CorrelationMetric::SquaredDifference => {
                    let d = te[i] - s;
                    d * d
                }
                CorrelationMetric::Product => (te[i] * s).abs(),
            };
        }
        lags.push(j as f64);
        curve.push(sum);
    }

    let maximize = metric == CorrelationMetric::Product;
    let spline = CubicSpline::new(lags, curve);
    let coarse = spline.extremum(-(range as f64), range as f64, COARSE_RESOLUTION, maximize);

    if coarse.abs() > range as f64 {
        warn!(coarse, lag_range, "coarse lag beyond search range");
        return None;
    }
    trace!(coarse, "coarse lag");

    // Fine stage: Fourier-shift the star around the coarse lag
    let shifter = FourierShifter::new(st.len());
    let steps = (FINE_HALF_WIDTH_PIXELS / FINE_STEP_PIXELS).round() as i64;
    let mut trial_shifts = Vec::with_capacity((2 * steps + 1) as usize);
    let mut fine_curve = Vec::with_capacity((2 * steps + 1) as usize);
    for j in -steps..=steps {
        let trial = coarse + j as f64 * FINE_STEP_PIXELS;
        let shifted = shifter.shift(&st, -trial);
        let mut sum = 0.0;
        for i in lag_range..trim_end {
            sum += match metric {
                CorrelationMetric::SquaredDifference => {
                    let d = shifted[i] - te[i];
                    d * d
                }
                CorrelationMetric::Product => (shifted[i] * te[i]).abs(),
            };
        }
        trial_shifts.push(trial);
        fine_curve.push(sum);
    }

    let spline = CubicSpline::new(trial_shifts, fine_curve);
    let fine = spline.extremum(
        coarse - FINE_HALF_WIDTH_PIXELS,
        coarse + FINE_HALF_WIDTH_PIXELS,
        FINE_RESOLUTION,
        maximize,
    );
    trace!(fine, "fine lag");

    Some(fine)
}

fn normalize_by_mean(values: &[f64]) -> Vec<f64> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| v / mean).collect()
}
