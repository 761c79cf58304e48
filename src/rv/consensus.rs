//! Consensus over per-window velocity measurements
//!
//! Each correlation window yields an independent velocity. The consensus
//! loop iteratively discards the most discordant measurement until the
//! survivors agree within a fixed tolerance, then averages them.
//!
//! The first round compares against the velocity from the window with the
//! highest signal-to-noise proxy; later rounds compare against the running
//! median. If the first round flags a majority of the other measurements,
//! the reference itself is the suspect, so the round is restarted against
//! the median before anything is dropped. A median round that flags exactly
//! two of three values stops the loop: dropping either would just be a
//! coin toss, so the set is averaged as-is.

use tracing::{debug, trace};

/// Combine per-window velocities into one robust estimate.
///
/// # Arguments
/// * `velocities` - Per-window velocities in km/s (NaN entries are dropped)
/// * `noise_proxies` - Per-window signal-to-noise proxies, same length
/// * `tolerance_kms` - Agreement tolerance in km/s
///
/// # Returns
/// Mean of the surviving velocities, or NaN when none are usable.
pub fn consensus_velocity(velocities: &[f64], noise_proxies: &[f64], tolerance_kms: f64) -> f64 {
    let mut values: Vec<f64> = Vec::new();
    let mut best_proxy = f64::NEG_INFINITY;
    let mut reference = f64::NAN;
    for (&v, &snr) in velocities.iter().zip(noise_proxies) {
        if !v.is_finite() {
            continue;
        }
        values.push(v);
        if snr > best_proxy {
            best_proxy = snr;
            reference = v;
        }
    }

    if values.is_empty() {
        return f64::NAN;
    }

    let mut use_median = false;
    loop {
        if values.len() <= 1 {
            break;
        }
        let anchor = if use_median {
            median(&values)
        } else {
            reference
        };

        // Deviations of everything except the anchor value itself
        let flagged: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != anchor)
            .map(|(i, &v)| (i, (v - anchor).abs()))
            .filter(|(_, dev)| *dev > tolerance_kms)
            .collect();

        if flagged.is_empty() {
            break;
        }

        if !use_median && flagged.len() >= 2 {
            // The noise-proxy reference disagrees with a majority; re-anchor
            // on the median so a bad reference cannot steer the rejection
            trace!(flagged = flagged.len(), "re-anchoring consensus on median");
            use_median = true;
            continue;
        }

        if use_median && flagged.len() == 2 {
            debug!("two of three discordant, no further improvement possible");
            break;
        }

        let &(worst, dev) = flagged
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(core::cmp::Ordering::Equal))
            .unwrap();
        trace!(velocity = values[worst], deviation = dev, "dropping outlier");
        values.remove(worst);
        use_median = true;
    }

    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of a non-empty slice.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlier_dropped_with_good_reference() {
        // Best noise proxy on the first window
        let rv = consensus_velocity(&[100.0, 105.0, 400.0], &[30.0, 20.0, 10.0], 10.0);
        assert!((rv - 102.5).abs() < 1e-9, "rv {}", rv);
    }

    #[test]
    fn test_outlier_dropped_even_when_reference() {
        // Best noise proxy on the outlier window; result must not change
        let rv = consensus_velocity(&[100.0, 105.0, 400.0], &[10.0, 20.0, 30.0], 10.0);
        assert!((rv - 102.5).abs() < 1e-9, "rv {}", rv);
    }

    #[test]
    fn test_agreeing_values_averaged() {
        let rv = consensus_velocity(&[50.0, 52.0, 48.0], &[1.0, 2.0, 3.0], 10.0);
        assert!((rv - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_spread_stops_without_dropping() {
        // Median round flags both outer values; mean of all three remains
        let rv = consensus_velocity(&[0.0, 100.0, 200.0], &[3.0, 1.0, 2.0], 10.0);
        assert!((rv - 100.0).abs() < 1e-9, "rv {}", rv);
    }

    #[test]
    fn test_negative_reference_same_tolerance() {
        let rv = consensus_velocity(&[-100.0, -105.0, -400.0], &[30.0, 20.0, 10.0], 10.0);
        assert!((rv + 102.5).abs() < 1e-9, "rv {}", rv);
    }

    #[test]
    fn test_nan_windows_ignored() {
        let rv = consensus_velocity(&[f64::NAN, 80.0, f64::NAN], &[1.0, 2.0, 3.0], 10.0);
        assert!((rv - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_usable_windows() {
        let rv = consensus_velocity(&[f64::NAN, f64::NAN], &[1.0, 2.0], 10.0);
        assert!(rv.is_nan());
    }

    #[test]
    fn test_two_values_trust_better_window() {
        let rv = consensus_velocity(&[100.0, 300.0], &[5.0, 1.0], 10.0);
        assert!((rv - 100.0).abs() < 1e-9, "rv {}", rv);
    }
}
