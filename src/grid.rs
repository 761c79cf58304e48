//! Canonical wavelength grid
//!
//! All spectra and templates are resampled onto one log-uniform grid before
//! any measurement happens.
//!
//! **Grid layout**:
//! - 65,000 points, `grid[i] = 10^((5 * log10(e) / c) * i + 3.55)`
//! - ~5 km/s-equivalent pixel spacing in velocity space
//! - truncated to [3650, 10200) Angstroms, the range the template library covers
//!
//! The spacing is uniform in log-wavelength, so a fixed pixel shift is the
//! same velocity shift everywhere on the grid. Cross-correlation lags can
//! therefore be converted to velocities with a single scale factor.

use lazy_static::lazy_static;

/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Number of points in the full (untruncated) grid
pub const GRID_SIZE: usize = 65_000;

/// Blue edge of the template library coverage in Angstroms
pub const GRID_MIN_ANGSTROMS: f64 = 3650.0;

/// Red edge of the template library coverage in Angstroms
pub const GRID_MAX_ANGSTROMS: f64 = 10_200.0;

/// log10(e), the factor converting natural-log spacing to base-10
const LOG10_E: f64 = 0.434_294_481_903_251_82;

lazy_static! {
    static ref CANONICAL: CanonicalGrid = CanonicalGrid::build();
}

struct CanonicalGrid {
    points: Vec<f64>,
    start: usize,
    stop: usize,
}

impl CanonicalGrid {
    fn build() -> Self {
        let step = 5.0 * LOG10_E / SPEED_OF_LIGHT_KMS;
        let points: Vec<f64> = (0..GRID_SIZE)
            .map(|i| 10f64.powf(step * i as f64 + 3.55))
            .collect();
        let start = bisect_right(&points, GRID_MIN_ANGSTROMS);
        let stop = bisect_right(&points, GRID_MAX_ANGSTROMS);
        Self { points, start, stop }
    }
}

/// The canonical wavelength grid restricted to [3650, 10200) Angstroms.
///
/// This is the wavelength array every gridded spectrum shares.
pub fn canonical_wavelengths() -> &'static [f64] {
    &CANONICAL.points[CANONICAL.start..CANONICAL.stop]
}

/// Index of the first element greater than `value` in a sorted slice.
pub fn bisect_right(xs: &[f64], value: f64) -> usize {
    xs.partition_point(|&x| x <= value)
}

/// Resample a spectrum onto the canonical grid.
///
/// Flux and variance are linearly interpolated; grid points outside the
/// input wavelength range become NaN (no extrapolation). The result is
/// truncated to [3650, 10200) Angstroms.
///
/// # Arguments
/// * `wavelength` - Strictly increasing wavelengths in Angstroms
/// * `flux` - Flux values, same length as `wavelength`
/// * `variance` - Per-pixel noise variance, same length
///
/// # Returns
/// `(wavelength, flux, variance)` on the truncated canonical grid
pub fn resample(
    wavelength: &[f64],
    flux: &[f64],
    variance: &[f64],
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let grid = canonical_wavelengths();
    let new_flux = interp(grid, wavelength, flux);
    let new_var = interp(grid, wavelength, variance);
    (grid.to_vec(), new_flux, new_var)
}

/// Linear interpolation of `(xs, ys)` at each target point, NaN outside
/// the data range. `xs` must be strictly increasing.
pub fn interp(targets: &[f64], xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    targets
        .iter()
        .map(|&t| {
            if n == 0 || t < xs[0] || t > xs[n - 1] {
                return f64::NAN;
            }
            if t == xs[n - 1] {
                return ys[n - 1];
            }
            let j = bisect_right(xs, t).max(1);
            let frac = (t - xs[j - 1]) / (xs[j] - xs[j - 1]);
            ys[j - 1] + frac * (ys[j] - ys[j - 1])
        })
        .collect()
}
