//! Fourier-domain fractional pixel shift
//!
//! A spectrum sampled on a uniform grid can be shifted by a non-integer
//! number of pixels by multiplying its discrete Fourier transform with a
//! per-frequency phase ramp. The fine cross-correlation stage evaluates
//! the match metric at sub-pixel trial shifts this way.

use num::complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Reusable fractional shifter for one array length.
///
/// Plans both FFT directions once; the fine correlation stage applies
/// dozens of trial shifts to the same window.
pub struct FourierShifter {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    /// Signed per-bin frequencies in cycles per sample
    freqs: Vec<f64>,
}

impl FourierShifter {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);

        // Frequencies arranged to match the transform's bin order:
        // 0, 1/N, ... up to the Nyquist wrap, then negative frequencies
        let n = len;
        let pre: Vec<f64> = (0..n).map(|i| i as f64 / n as f64 - 0.5).collect();
        let half = n / 2;
        let freqs: Vec<f64> = (0..n).map(|k| pre[(k + n - half) % n]).collect();

        Self {
            forward,
            inverse,
            freqs,
        }
    }

    /// Shift `flux` by `shift` pixels (positive moves features redward)
    /// and return the real part of the result.
    pub fn shift(&self, flux: &[f64], shift: f64) -> Vec<f64> {
        let n = flux.len();
        debug_assert_eq!(n, self.freqs.len());

        let mut buffer: Vec<Complex64> = flux.iter().map(|&f| Complex64::new(f, 0.0)).collect();
        self.inverse.process(&mut buffer);

        for (value, freq) in buffer.iter_mut().zip(self.freqs.iter()) {
            let phase = freq * 2.0 * std::f64::consts::PI * shift;
            *value *= Complex64::new(phase.cos(), phase.sin());
        }

        self.forward.process(&mut buffer);
        let scale = 1.0 / n as f64;
        buffer.iter().map(|c| c.re * scale).collect()
    }
}
