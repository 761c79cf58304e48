//! White dwarf Balmer profile fit
//!
//! Pressure broadening makes white dwarf Balmer lines far wider than those
//! of ordinary blue stars, so a Gaussian fitted to the H-alpha region
//! separates the two populations by its width alone.
//!
//! **Model**: `A * exp(-0.5 * ((x - mu) / sigma)^2) + m * x + b`, fitted by
//! Levenberg-Marquardt over 6200-6900 Angstroms.
//!
//! The fit outcome is an explicit sum type. A fit that fails to converge is
//! ordinary data for the matcher's fallback logic, never an error.

use crate::spectrum::Spectrum;
use tracing::{debug, trace};

/// Result of the Balmer profile fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitOutcome {
    /// Fit converged with the given Gaussian width in Angstroms
    Converged { sigma: f64 },
    /// Fit did not converge; the width is unusable
    DidNotConverge,
}

/// Wavelength window of the H-alpha fit in Angstroms
pub const FIT_WINDOW_ANGSTROMS: (f64, f64) = (6200.0, 6900.0);

/// Initial parameters: center, sigma, amplitude, slope, intercept
const INITIAL_PARAMS: [f64; 5] = [6564.5377, 25.0, 0.75, -1.0, 1.0];

const MAX_ITERATIONS: usize = 100;
const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;

/// Fit the Gaussian-plus-continuum model to the H-alpha region.
pub fn fit_balmer_profile(spectrum: &Spectrum) -> FitOutcome {
    let (lo, hi) = FIT_WINDOW_ANGSTROMS;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (w, f) in spectrum.wavelength().iter().zip(spectrum.flux()) {
        if *w >= lo && *w <= hi && f.is_finite() {
            xs.push(*w);
            ys.push(*f);
        }
    }
    if xs.len() <= INITIAL_PARAMS.len() {
        debug!(points = xs.len(), "too few points for Balmer profile fit");
        return FitOutcome::DidNotConverge;
    }
    fit_gaussian_linear(&xs, &ys)
}

/// Levenberg-Marquardt fit of the five-parameter Gaussian-plus-line model.
fn fit_gaussian_linear(xs: &[f64], ys: &[f64]) -> FitOutcome {
    let mut params = INITIAL_PARAMS;
    let mut lambda = LAMBDA_INITIAL;
    let mut ssr = sum_squared_residuals(xs, ys, &params);
    if !ssr.is_finite() {
        return FitOutcome::DidNotConverge;
    }

    for iteration in 0..MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(xs, ys, &params);

        // Damped step: (JtJ + lambda * diag(JtJ)) delta = Jtr
        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj;
            for k in 0..5 {
                damped[k][k] += lambda * jtj[k][k].max(1e-12);
            }
            let Some(delta) = solve_5x5(damped, jtr) else {
                lambda *= 10.0;
                continue;
            };

            let mut trial = params;
            for k in 0..5 {
                trial[k] += delta[k];
            }
            let trial_ssr = sum_squared_residuals(xs, ys, &trial);

            if trial_ssr.is_finite() && trial_ssr < ssr {
                let improvement = ssr - trial_ssr;
                params = trial;
                ssr = trial_ssr;
                lambda = (lambda / 10.0).max(1e-14);
                accepted = true;

                if improvement <= 1e-10 * (ssr + 1e-30) {
                    trace!(iteration, sigma = params[1], "profile fit converged");
                    return FitOutcome::Converged {
                        sigma: params[1].abs(),
                    };
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No damped step improves the fit. If the gradient has already
            // flattened out we are sitting at the minimum; otherwise the fit
            // is stuck somewhere useless.
            let gradient = jtr.iter().fold(0.0f64, |m, g| m.max(g.abs()));
            if gradient <= 1e-6 * (1.0 + ssr) {
                trace!(iteration, sigma = params[1], "profile fit converged");
                return FitOutcome::Converged {
                    sigma: params[1].abs(),
                };
            }
            trace!(iteration, lambda, gradient, "profile fit stalled");
            return FitOutcome::DidNotConverge;
        }
    }

    FitOutcome::DidNotConverge
}

fn model(x: f64, p: &[f64; 5]) -> f64 {
    let [mu, sigma, a, m, b] = *p;
    let z = (x - mu) / sigma;
    a * (-0.5 * z * z).exp() + m * x + b
}

fn sum_squared_residuals(xs: &[f64], ys: &[f64], p: &[f64; 5]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = y - model(x, p);
            r * r
        })
        .sum()
}

/// Accumulate Jt*J and Jt*r for the current parameters.
fn normal_equations(xs: &[f64], ys: &[f64], p: &[f64; 5]) -> ([[f64; 5]; 5], [f64; 5]) {
    let [mu, sigma, a, _m, _b] = *p;
    let mut jtj = [[0.0; 5]; 5];
    let mut jtr = [0.0; 5];

    for (&x, &y) in xs.iter().zip(ys) {
        let z = (x - mu) / sigma;
        let e = (-0.5 * z * z).exp();
        let jac = [
            a * e * z / sigma,     // d/d mu
            a * e * z * z / sigma, // d/d sigma
            e,                     // d/d A
            x,                     // d/d m
            1.0,                   // d/d b
        ];
        let r = y - model(x, p);
        for i in 0..5 {
            jtr[i] += jac[i] * r;
            for j in 0..5 {
                jtj[i][j] += jac[i] * jac[j];
            }
        }
    }

    (jtj, jtr)
}

/// Solve a 5x5 linear system by Gaussian elimination with partial pivoting.
fn solve_5x5(mut a: [[f64; 5]; 5], mut b: [f64; 5]) -> Option<[f64; 5]> {
    for col in 0..5 {
        let pivot = (col..5)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(core::cmp::Ordering::Equal)
            })
            .unwrap();
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..5 {
            let factor = a[row][col] / a[col][col];
            for k in col..5 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 5];
    for row in (0..5).rev() {
        let mut sum = b[row];
        for k in row + 1..5 {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
        if !x[row].is_finite() {
            return None;
        }
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_balmer_spectrum(sigma: f64, depth: f64) -> Spectrum {
        let wavelength: Vec<f64> = (0..7000).map(|i| 3600.0 + i as f64).collect();
        let flux: Vec<f64> = wavelength
            .iter()
            .map(|&w| {
                let z = (w - 6564.5) / sigma;
                1.0 - depth * (-0.5 * z * z).exp()
            })
            .collect();
        let variance = vec![1e-4; wavelength.len()];
        Spectrum::from_raw(wavelength, flux, variance)
    }

    #[test]
    fn test_fit_recovers_broad_line_width() {
        let spectrum = synthetic_balmer_spectrum(30.0, 0.5);
        match fit_balmer_profile(&spectrum) {
            FitOutcome::Converged { sigma } => {
                assert!((sigma - 30.0).abs() < 1.0, "sigma {}", sigma);
            }
            FitOutcome::DidNotConverge => panic!("fit should converge"),
        }
    }

    #[test]
    fn test_fit_recovers_narrow_line_width() {
        let spectrum = synthetic_balmer_spectrum(8.0, 0.6);
        match fit_balmer_profile(&spectrum) {
            FitOutcome::Converged { sigma } => {
                assert!((sigma - 8.0).abs() < 1.0, "sigma {}", sigma);
            }
            FitOutcome::DidNotConverge => panic!("fit should converge"),
        }
    }

    #[test]
    fn test_fit_needs_data() {
        // Spectrum that stops short of the H-alpha window
        let wavelength: Vec<f64> = (0..2000).map(|i| 3700.0 + i as f64).collect();
        let flux = vec![1.0; 2000];
        let variance = vec![1e-4; 2000];
        let spectrum = Spectrum::from_raw(wavelength, flux, variance);
        assert_eq!(fit_balmer_profile(&spectrum), FitOutcome::DidNotConverge);
    }

    #[test]
    fn test_solve_identity() {
        let mut a = [[0.0; 5]; 5];
        for i in 0..5 {
            a[i][i] = 2.0;
        }
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        let x = solve_5x5(a, b).unwrap();
        for (i, v) in x.iter().enumerate() {
            assert!((v - (i as f64 + 1.0)).abs() < 1e-12);
        }
    }
}
