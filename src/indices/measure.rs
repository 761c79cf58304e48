//! Index measurement with propagated uncertainty
//!
//! Each index is the ratio of band-averaged flux, with a variance
//! propagated from the per-pixel noise variance. Indices whose bands fall
//! outside the measured wavelength range, or whose denominator band has a
//! non-positive mean, carry the sentinel `(0, +inf)`: a value that
//! contributes zero weight to template matching without being an error.

use super::defs::{Bands, LINE_INDICES, LINE_INDEX_COUNT};
use crate::grid::bisect_right;
use crate::spectrum::Spectrum;

/// Measured values and variances for the full index vocabulary, in the
/// fixed declaration order. Created fresh per measurement.
#[derive(Debug, Clone)]
pub struct LineIndexSet {
    pub values: [f64; LINE_INDEX_COUNT],
    pub variances: [f64; LINE_INDEX_COUNT],
}

impl LineIndexSet {
    /// A set with every index marked unusable.
    pub fn unusable() -> Self {
        Self {
            values: [0.0; LINE_INDEX_COUNT],
            variances: [f64::INFINITY; LINE_INDEX_COUNT],
        }
    }

    /// Value and variance of a named index.
    pub fn get(&self, name: &str) -> Option<(f64, f64)> {
        let pos = super::defs::index_position(name)?;
        Some((self.values[pos], self.variances[pos]))
    }
}

/// Mean flux and standard error of one wavelength band, or None when the
/// band extends past the end of the array or is empty.
fn band_stats(spectrum: &Spectrum, lo: f64, hi: f64) -> Option<(f64, f64)> {
    let wavelength = spectrum.wavelength();
    let i_lo = bisect_right(wavelength, lo);
    let i_hi = bisect_right(wavelength, hi);
    if i_hi >= wavelength.len() || i_lo >= i_hi {
        return None;
    }
    let flux = &spectrum.flux()[i_lo..i_hi];
    let var = &spectrum.variance()[i_lo..i_hi];
    let n = flux.len() as f64;
    let mean = flux.iter().sum::<f64>() / n;
    let std = var.iter().sum::<f64>().sqrt() / n;
    Some((mean, std))
}

/// Measure the full line index vocabulary on a gridded spectrum.
///
/// # Returns
/// A `LineIndexSet` in the fixed index order; unusable indices carry the
/// `(0, +inf)` sentinel.
pub fn measure_lines(spectrum: &Spectrum) -> LineIndexSet {
    let mut set = LineIndexSet::unusable();

    for (pos, def) in LINE_INDICES.iter().enumerate() {
        let measured = match def.bands {
            Bands::Single {
                num_lo,
                num_hi,
                den_lo,
                den_hi,
            } => {
                let num = band_stats(spectrum, num_lo, num_hi);
                let den = band_stats(spectrum, den_lo, den_hi);
                match (num, den) {
                    (Some((num_mean, num_std)), Some((den_mean, den_std))) => {
                        ratio_index(num_mean, num_std, den_mean, den_std)
                    }
                    _ => None,
                }
            }
            Bands::Dual {
                num1_lo,
                num1_hi,
                w1,
                num2_lo,
                num2_hi,
                w2,
                den_lo,
                den_hi,
            } => {
                let num1 = band_stats(spectrum, num1_lo, num1_hi);
                let num2 = band_stats(spectrum, num2_lo, num2_hi);
                let den = band_stats(spectrum, den_lo, den_hi);
                match (num1, num2, den) {
                    (Some((m1, s1)), Some((m2, s2)), Some((den_mean, den_std))) => {
                        let combo_mean = w1 * m1 + w2 * m2;
                        let combo_std = (w1 * w1 * s1 * s1 + w2 * w2 * s2 * s2).sqrt();
                        ratio_index(combo_mean, combo_std, den_mean, den_std)
                    }
                    _ => None,
                }
            }
        };

        if let Some((value, variance)) = measured {
            set.values[pos] = value;
            set.variances[pos] = variance;
        }
    }

    set
}

/// Ratio of two band means with propagated variance, or None when the
/// denominator mean is non-positive or either mean is not finite.
fn ratio_index(num_mean: f64, num_std: f64, den_mean: f64, den_std: f64) -> Option<(f64, f64)> {
    if !num_mean.is_finite() || !den_mean.is_finite() || den_mean <= 0.0 {
        return None;
    }
    let value = num_mean / den_mean;
    let rel_num = num_std / num_mean;
    let rel_den = den_std / den_mean;
    let variance = value * value * (rel_num * rel_num + rel_den * rel_den);
    Some((value, variance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::defs::index_position;

    fn spectrum_with_flux(f: impl Fn(f64) -> f64) -> Spectrum {
        let wavelength: Vec<f64> = (0..7000).map(|i| 3600.0 + i as f64).collect();
        let flux: Vec<f64> = wavelength.iter().map(|&w| f(w)).collect();
        let variance = vec![0.01; wavelength.len()];
        Spectrum::from_raw(wavelength, flux, variance)
    }

    #[test]
    fn test_flat_flux_gives_unit_indices() {
        let spectrum = spectrum_with_flux(|_| 1.0);
        let lines = measure_lines(&spectrum);
        let (value, variance) = lines.get("TiO5").unwrap();
        assert!((value - 1.0).abs() < 1e-9, "TiO5 {}", value);
        assert!(variance.is_finite() && variance > 0.0);
    }

    #[test]
    fn test_zero_denominator_gives_sentinel() {
        // Kill flux in the TiO5/CaH denominator band [7043.9, 7047.9]
        let spectrum = spectrum_with_flux(|w| {
            if (7040.0..7050.0).contains(&w) {
                0.0
            } else {
                1.0
            }
        });
        let lines = measure_lines(&spectrum);
        for name in ["TiO5", "CaH2", "CaH3"] {
            let (value, variance) = lines.get(name).unwrap();
            assert_eq!(value, 0.0, "{name}");
            assert!(variance.is_infinite(), "{name}");
        }
    }

    #[test]
    fn test_band_past_array_end_gives_sentinel() {
        // region5's numerator runs to the grid edge at 10200
        let spectrum = spectrum_with_flux(|_| 1.0);
        let lines = measure_lines(&spectrum);
        let (value, variance) = lines.get("region5").unwrap();
        assert_eq!(value, 0.0);
        assert!(variance.is_infinite());
    }

    #[test]
    fn test_band_outside_coverage_gives_sentinel() {
        // Spectrum only covers the red half; blue indices are unusable
        let wavelength: Vec<f64> = (0..4000).map(|i| 6000.0 + i as f64).collect();
        let flux = vec![1.0; 4000];
        let variance = vec![0.01; 4000];
        let spectrum = Spectrum::from_raw(wavelength, flux, variance);
        let lines = measure_lines(&spectrum);
        let (value, variance) = lines.get("CaK").unwrap();
        assert_eq!(value, 0.0);
        assert!(variance.is_infinite());
    }

    #[test]
    fn test_dual_band_weighting() {
        // Flux 2.0 in the first numerator band of VO7445, 1.0 elsewhere.
        // combo = 0.5625 * 2 + 0.4375 * 1, denominator mean 1... except the
        // second VO7445 numerator overlaps [7512, 7562], still 1.0.
        let spectrum = spectrum_with_flux(|w| {
            if (7352.0..7402.1).contains(&w) {
                2.0
            } else {
                1.0
            }
        });
        let lines = measure_lines(&spectrum);
        let pos = index_position("VO7445").unwrap();
        let expected = 0.5625 * 2.0 + 0.4375 * 1.0;
        assert!(
            (lines.values[pos] - expected).abs() < 0.01,
            "VO7445 {} vs {}",
            lines.values[pos],
            expected
        );
    }
}
