//! Gridded spectrum container
//!
//! One `Spectrum` holds the wavelength, flux and variance arrays for a
//! single observation, resampled onto the canonical grid. The surrounding
//! application parses files into raw arrays; this type owns everything that
//! happens after that: gridding, flux normalization, the signal-to-noise
//! estimate and the rest-frame shift.
//!
//! A single mutable `Spectrum` is typically reused across a batch, with new
//! data loaded over the old. Callers must not hold references across a
//! reload.

use crate::grid::{self, SPEED_OF_LIGHT_KMS};
use tracing::debug;

/// Default wavelength (Angstroms) at which flux is normalized. The template
/// library is normalized at the same point.
pub const DEFAULT_NORM_WAVELENGTH: f64 = 8000.0;

/// Half-width in pixels of the averaging window used for normalization
const NORM_WINDOW_HALF_WIDTH: usize = 10;

#[derive(Debug, Clone)]
pub struct Spectrum {
    wavelength: Vec<f64>,
    flux: Vec<f64>,
    variance: Vec<f64>,
    norm_wavelength: f64,
}

impl Spectrum {
    /// Build a spectrum from raw parsed arrays, resampling onto the
    /// canonical grid and choosing the normalization wavelength.
    ///
    /// The default 8000 Angstrom reference is used when flux is defined
    /// there; otherwise the midpoint of the finite-flux range stands in.
    ///
    /// # Arguments
    /// * `wavelength` - Strictly increasing wavelengths in Angstroms
    /// * `flux` - Flux values, same length; may contain NaN
    /// * `variance` - Per-pixel noise variance, same length
    pub fn from_raw(wavelength: Vec<f64>, flux: Vec<f64>, variance: Vec<f64>) -> Self {
        let (wavelength, flux, variance) = grid::resample(&wavelength, &flux, &variance);
        let mut spectrum = Self {
            wavelength,
            flux,
            variance,
            norm_wavelength: DEFAULT_NORM_WAVELENGTH,
        };
        spectrum.norm_wavelength = spectrum.pick_norm_wavelength();
        spectrum
    }

    fn pick_norm_wavelength(&self) -> f64 {
        let idx = grid::bisect_right(&self.wavelength, DEFAULT_NORM_WAVELENGTH);
        if idx < self.flux.len() && self.flux[idx].is_finite() {
            return DEFAULT_NORM_WAVELENGTH;
        }
        match self.finite_flux_range() {
            Some((lo, hi)) => {
                let mid = (lo + hi) / 2.0;
                debug!(norm_wavelength = mid, "flux undefined at default reference");
                mid
            }
            None => DEFAULT_NORM_WAVELENGTH,
        }
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn variance(&self) -> &[f64] {
        &self.variance
    }

    pub fn norm_wavelength(&self) -> f64 {
        self.norm_wavelength
    }

    /// First and last wavelength where flux is finite, if any.
    pub fn finite_flux_range(&self) -> Option<(f64, f64)> {
        let first = self.flux.iter().position(|f| f.is_finite())?;
        let last = self.flux.iter().rposition(|f| f.is_finite())?;
        Some((self.wavelength[first], self.wavelength[last]))
    }

    /// Median signal to noise of the spectrum, `median(flux) / median(sqrt(var))`
    /// over the finite samples.
    pub fn signal_to_noise(&self) -> f64 {
        let signal = median_finite(&self.flux);
        let noise = median_finite_by(&self.variance, |v| v.sqrt());
        signal / noise
    }

    /// Scale flux to 1.0 at the normalization wavelength.
    pub fn normalize_flux(&mut self) {
        self.flux = normalize(&self.wavelength, self.norm_wavelength, &self.flux);
    }

    /// Shift the wavelength array to the rest frame using a measured radial
    /// velocity, then re-resample onto the canonical grid.
    ///
    /// A NaN velocity means the measurement failed; the shift is taken as
    /// zero and classification proceeds in the observed frame.
    pub fn shift_to_rest(&mut self, radial_velocity_kms: f64) {
        let rv = if radial_velocity_kms.is_nan() {
            0.0
        } else {
            radial_velocity_kms
        };
        let factor = rv / SPEED_OF_LIGHT_KMS + 1.0;
        for w in self.wavelength.iter_mut() {
            *w /= factor;
        }
        self.regrid();
    }

    /// Re-resample the current arrays onto the canonical grid.
    pub fn regrid(&mut self) {
        let (wavelength, flux, variance) =
            grid::resample(&self.wavelength, &self.flux, &self.variance);
        self.wavelength = wavelength;
        self.flux = flux;
        self.variance = variance;
    }
}

/// Normalize flux to 1.0 at a reference wavelength.
///
/// The scale factor is the mean flux over a 20-pixel window around the
/// reference point. When flux at the reference is undefined, the midpoint
/// of the finite-flux range is used instead.
pub fn normalize(wavelength: &[f64], norm_wavelength: f64, flux: &[f64]) -> Vec<f64> {
    let mut idx = grid::bisect_right(wavelength, norm_wavelength);
    if idx >= flux.len() || !flux[idx].is_finite() {
        let first = flux.iter().position(|f| f.is_finite());
        let last = flux.iter().rposition(|f| f.is_finite());
        if let (Some(first), Some(last)) = (first, last) {
            let mid = (wavelength[first] + wavelength[last]) / 2.0;
            idx = grid::bisect_right(wavelength, mid);
        }
    }
    let lo = idx.saturating_sub(NORM_WINDOW_HALF_WIDTH);
    let hi = (idx + NORM_WINDOW_HALF_WIDTH).min(flux.len());
    let window = &flux[lo..hi];
    let factor = window.iter().sum::<f64>() / window.len() as f64;
    flux.iter().map(|f| f / factor).collect()
}

/// Convert air wavelengths to vacuum in place using the IAU standard factor
/// (Morton 1991). Values below 2000 Angstroms are left unchanged.
pub fn air_to_vacuum(wavelength: &mut [f64]) {
    for w in wavelength.iter_mut() {
        if *w < 2000.0 {
            continue;
        }
        let sigma2 = (1e4 / *w) * (1e4 / *w);
        let factor =
            1.0 + 6.4328e-5 + 2.94981e-2 / (146.0 - sigma2) + 2.5540e-4 / (41.0 - sigma2);
        *w *= factor;
    }
}

/// Repair the detector stitch artifact between 5569 and 5588 Angstroms by
/// linear interpolation across the seam.
pub fn remove_stitch_spike(wavelength: &[f64], flux: &[f64]) -> Vec<f64> {
    let mut flux = flux.to_vec();
    let lower = wavelength.partition_point(|&w| w < 5569.0);
    let upper = wavelength.partition_point(|&w| w < 5588.0);
    if lower == 0 || upper >= wavelength.len() || lower >= upper {
        return flux;
    }
    let (w0, w1) = (wavelength[lower], wavelength[upper]);
    let (f0, f1) = (flux[lower], flux[upper]);
    for i in lower..upper {
        let frac = (wavelength[i] - w0) / (w1 - w0);
        flux[i] = f0 + frac * (f1 - f0);
    }
    flux
}

fn median_finite(values: &[f64]) -> f64 {
    median_finite_by(values, |v| v)
}

fn median_finite_by(values: &[f64], map: impl Fn(f64) -> f64) -> f64 {
    let mut finite: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| map(v))
        .collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
    let n = finite.len();
    if n % 2 == 1 {
        finite[n / 2]
    } else {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    }
}
