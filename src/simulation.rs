//! Synthetic spectrum generation
//!
//! Helpers for building test and benchmark spectra: a smooth continuum,
//! Gaussian absorption lines, Doppler shifts and flux noise.

#![allow(unused)]

use rand::prelude::*;
use rand_distr::{Distribution, Normal};

use crate::grid::SPEED_OF_LIGHT_KMS;

/// Apply a Doppler shift in place, `wavelength *= (1 + v/c)`.
pub fn doppler_shift(wavelength: &mut [f64], velocity_kms: f64) {
    let factor = 1.0 + velocity_kms / SPEED_OF_LIGHT_KMS;
    for w in wavelength.iter_mut() {
        *w *= factor;
    }
}

/// Smooth pseudo-continuum with a temperature-dependent slope, scaled to
/// roughly 1.0 at 8000 Angstroms.
pub fn continuum(wavelength: &[f64], temperature_k: f64) -> Vec<f64> {
    // Warmer stars slope up toward the blue, cooler ones toward the red
    let slope = (temperature_k - 5800.0) / 40_000.0;
    wavelength
        .iter()
        .map(|&w| 1.0 - slope * (w - 8000.0) / 1000.0)
        .collect()
}

/// Imprint a Gaussian absorption line of the given fractional depth.
pub fn absorb(wavelength: &[f64], flux: &mut [f64], center: f64, depth: f64, sigma: f64) {
    for (w, f) in wavelength.iter().zip(flux.iter_mut()) {
        let z = (w - center) / sigma;
        *f *= 1.0 - depth * (-0.5 * z * z).exp();
    }
}

/// Add zero-mean Gaussian noise to flux, returning the matching variance
/// array.
pub fn add_noise(flux: &mut [f64], sigma: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    for f in flux.iter_mut() {
        *f += normal.sample(&mut rng);
    }
    vec![sigma * sigma; flux.len()]
}
