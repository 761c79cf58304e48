//! Radial velocity estimation
//!
//! The observed spectrum is cross-correlated against the flux of its
//! best-matching template over up to three independent 1000 Angstrom
//! windows. Each window's sub-pixel lag converts to a velocity through the
//! grid's uniform log-wavelength spacing; the per-window velocities are
//! combined by an outlier-rejecting consensus.
//!
//! **Module Organization**:
//! - `xcorr` - coarse + fine cross-correlation for one window
//! - `shift` - Fourier-domain fractional pixel shift
//! - `spline` - natural cubic spline used to localize lag-curve extrema
//! - `consensus` - outlier-rejecting combination of window velocities

pub mod consensus;
pub mod shift;
pub mod spline;
pub mod xcorr;

pub use consensus::consensus_velocity;
pub use shift::FourierShifter;
pub use spline::CubicSpline;
pub use xcorr::{cross_correlate, CorrelationMetric};

use crate::classify::Guess;
use crate::error::TemplateError;
use crate::grid::SPEED_OF_LIGHT_KMS;
use crate::spectrum::{self, Spectrum};
use crate::templates::{TemplateIndexLibrary, TemplateStore, SB2_CLASS_START};
use tracing::{debug, info, instrument, warn};

/// Correlation windows in Angstroms, blue to red
pub const CORRELATION_WINDOWS_ANGSTROMS: [(f64, f64); 3] =
    [(5000.0, 6000.0), (6000.0, 7000.0), (7000.0, 8000.0)];

/// Narrow bands used for the per-window noise proxy, in Angstroms
pub const NOISE_BANDS_ANGSTROMS: [(f64, f64); 3] =
    [(5000.0, 5100.0), (6800.0, 6900.0), (7400.0, 7500.0)];

/// Integer lag search half-width in pixels
pub const LAG_RANGE_PIXELS: usize = 50;

/// Consensus agreement tolerance in km/s. Empirical calibration value from
/// the survey pipeline (Kesseli et al. 2017), not derived here.
pub const CONSENSUS_TOLERANCE_KMS: f64 = 10.0;

/// Configuration of the radial velocity estimate.
#[derive(Debug, Clone)]
pub struct RvConfig {
    /// Integer lag search half-width in pixels
    pub lag_range: usize,
    /// Match metric for the lag search
    pub metric: CorrelationMetric,
    /// Consensus agreement tolerance in km/s
    pub consensus_tolerance_kms: f64,
}

impl Default for RvConfig {
    fn default() -> Self {
        Self {
            lag_range: LAG_RANGE_PIXELS,
            metric: CorrelationMetric::SquaredDifference,
            consensus_tolerance_kms: CONSENSUS_TOLERANCE_KMS,
        }
    }
}

/// Estimates the Doppler shift of a spectrum against its matched template.
pub struct RadialVelocityEstimator<'a> {
    library: &'a TemplateIndexLibrary,
    store: &'a TemplateStore,
    config: RvConfig,
}

impl<'a> RadialVelocityEstimator<'a> {
    pub fn new(library: &'a TemplateIndexLibrary, store: &'a TemplateStore) -> Self {
        Self::with_config(library, store, RvConfig::default())
    }

    pub fn with_config(
        library: &'a TemplateIndexLibrary,
        store: &'a TemplateStore,
        config: RvConfig,
    ) -> Self {
        Self {
            library,
            store,
            config,
        }
    }

    /// Estimate the radial velocity in km/s.
    ///
    /// Returns NaN when no correlation window is coverable (spectrum too
    /// short to measure) or the guess is unclassifiable; a missing or
    /// unreadable template flux file is a typed error.
    #[instrument(skip(self, spectrum, guess), fields(spec_type = guess.spec_type))]
    pub fn estimate(&self, spectrum: &Spectrum, guess: &Guess) -> Result<f64, TemplateError> {
        let Some(name) = template_file_name(guess, self.library) else {
            warn!("no template resolvable for guess, skipping velocity estimate");
            return Ok(f64::NAN);
        };
        debug!(template = %name, "cross-correlation template");

        let template = self.store.gridded(&name, guess.is_composite)?;
        let template_flux = spectrum::normalize(
            &template.wavelength,
            spectrum.norm_wavelength(),
            &template.flux,
        );

        let Some((covered_lo, covered_hi)) = spectrum.finite_flux_range() else {
            warn!("no finite flux, cannot measure velocity");
            return Ok(f64::NAN);
        };

        let wave = spectrum.wavelength();
        // Uniform in log-wavelength, so the first pixel pair fixes the
        // velocity scale for every window
        let pixel = wave[1] - wave[0];
        let center = (wave[1] + wave[0]) / 2.0;

        let mut velocities = Vec::new();
        let mut proxies = Vec::new();
        for (window, noise_band) in CORRELATION_WINDOWS_ANGSTROMS
            .iter()
            .zip(NOISE_BANDS_ANGSTROMS.iter())
        {
            let (lo, hi) = *window;
            if covered_lo >= lo || covered_hi <= hi {
                warn!(
                    window_lo = lo,
                    window_hi = hi,
                    "velocity may lose accuracy, correlation window not covered"
                );
                continue;
            }

            let i0 = wave.partition_point(|&w| w <= lo);
            let i1 = wave.partition_point(|&w| w < hi);
            let star = &spectrum.flux()[i0..i1];
            let temp = &template_flux[i0..i1];

            let Some(shift) = cross_correlate(star, temp, self.config.lag_range, self.config.metric)
            else {
                warn!(window_lo = lo, "correlation failed for window");
                continue;
            };

            let velocity = shift * pixel / center * SPEED_OF_LIGHT_KMS;
            let proxy = noise_proxy(spectrum, *noise_band);
            debug!(window_lo = lo, shift, velocity, proxy, "window velocity");
            velocities.push(velocity);
            proxies.push(proxy);
        }

        if velocities.is_empty() {
            info!("spectrum too short to measure radial velocity");
            return Ok(f64::NAN);
        }

        let rv = consensus_velocity(&velocities, &proxies, self.config.consensus_tolerance_kms);
        info!(rv, windows = velocities.len(), "radial velocity");
        Ok(rv)
    }
}

/// Resolve the template flux file for a guess.
///
/// Classes without a metallicity axis, and boundary subtypes, use
/// metallicity-free names; otherwise the most common metallicity template
/// for the class is used. Composite guesses use the matched SB2 name.
pub fn template_file_name(guess: &Guess, library: &TemplateIndexLibrary) -> Option<String> {
    if guess.is_unclassifiable() {
        return None;
    }
    if guess.spec_type >= SB2_CLASS_START {
        return library
            .sb2_name(guess.spec_type)
            .map(|name| format!("{name}.csv"));
    }
    let s = guess.sub_type;
    let name = match guess.spec_type {
        0 => format!("O{s}.csv"),
        1 => format!("B{s}.csv"),
        2 if s < 3 => format!("A{s}.csv"),
        2 => format!("A{s}_-1.0_Dwarf.csv"),
        3 => format!("F{s}_-1.0_Dwarf.csv"),
        4 => format!("G{s}_+0.0_Dwarf.csv"),
        5 => format!("K{s}_+0.0_Dwarf.csv"),
        6 if s < 9 => format!("M{s}_+0.0_Dwarf.csv"),
        6 => format!("M{s}.csv"),
        7 => format!("L{s}.csv"),
        8 => format!("C{s}.csv"),
        9 => format!("WD{s}.csv"),
        _ => return None,
    };
    Some(name)
}

/// Mean over standard deviation of flux in a fixed narrow band.
fn noise_proxy(spectrum: &Spectrum, band: (f64, f64)) -> f64 {
    let wave = spectrum.wavelength();
    let i0 = wave.partition_point(|&w| w <= band.0);
    let i1 = wave.partition_point(|&w| w < band.1);
    let flux = &spectrum.flux()[i0..i1];
    if flux.is_empty() {
        return f64::NAN;
    }
    let n = flux.len() as f64;
    let mean = flux.iter().sum::<f64>() / n;
    let var = flux.iter().map(|f| (f - mean) * (f - mean)).sum::<f64>() / n;
    mean / var.sqrt()
}
