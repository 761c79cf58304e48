//! Per-spectrum classification pipeline
//!
//! Runs the full measurement sequence for one spectrum: signal-to-noise
//! cut, flux normalization, first classification pass, radial velocity
//! estimate, rest-frame shift, second classification pass. The caller owns
//! file parsing and report writing; the pipeline returns either a result
//! record or a typed per-spectrum rejection reason.
//!
//! The library and template store are read-only, so one pipeline can serve
//! a whole batch in parallel.

use crate::classify::{Guess, SpectralTypeMatcher};
use crate::error::{self, ProcessError};
use crate::indices::measure_lines;
use crate::rv::{RadialVelocityEstimator, RvConfig};
use crate::spectrum::Spectrum;
use crate::templates::{TemplateIndexLibrary, TemplateStore};
use rayon::prelude::*;
use snafu::ResultExt;
use tracing::{debug, info, instrument};

/// Configuration for the classification pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Reject spectra below this signal-to-noise, when set
    pub sn_cut: Option<f64>,
    /// Radial velocity estimator configuration
    pub rv: RvConfig,
}

/// Result record for one processed spectrum.
#[derive(Debug, Clone)]
pub struct SpectrumClassification {
    /// First-pass guess, before the rest-frame shift
    pub first_guess: Guess,
    /// Measured radial velocity in km/s, NaN when unmeasurable
    pub radial_velocity_kms: f64,
    /// Final guess after the rest-frame shift
    pub guess: Guess,
    /// Human-readable type label of the final guess
    pub spec_type: String,
    /// Signed metallicity label of the final guess, e.g. "+0.0"
    pub metallicity: String,
    /// Median signal to noise of the input spectrum
    pub signal_to_noise: f64,
}

/// The classification pipeline over shared read-only matching data.
pub struct Pipeline<'a> {
    library: &'a TemplateIndexLibrary,
    store: &'a TemplateStore,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(library: &'a TemplateIndexLibrary, store: &'a TemplateStore) -> Self {
        Self::with_config(library, store, PipelineConfig::default())
    }

    pub fn with_config(
        library: &'a TemplateIndexLibrary,
        store: &'a TemplateStore,
        config: PipelineConfig,
    ) -> Self {
        Self {
            library,
            store,
            config,
        }
    }

    /// Process one spectrum to completion.
    ///
    /// The spectrum is mutated in place (normalization and rest-frame
    /// shift); callers reusing one spectrum object must reload between
    /// files.
    #[instrument(skip_all)]
    pub fn process(&self, spectrum: &mut Spectrum) -> Result<SpectrumClassification, ProcessError> {
        let sn = spectrum.signal_to_noise();
        if let Some(cut) = self.config.sn_cut {
            // An undefined signal-to-noise also fails the cut
            if sn < cut || sn.is_nan() {
                return error::LowSignalToNoiseSnafu { sn, cut }.fail();
            }
        }

        spectrum.normalize_flux();

        let matcher = SpectralTypeMatcher::new(self.library);
        let lines = measure_lines(spectrum);
        let first_guess = matcher.classify(spectrum, &lines);
        debug!(
            spec_type = first_guess.spec_type,
            sub_type = first_guess.sub_type,
            distance = first_guess.distance,
            "first pass"
        );

        let radial_velocity_kms = if first_guess.is_unclassifiable() {
            debug!("first pass unclassifiable, skipping velocity estimate");
            f64::NAN
        } else {
            let estimator =
                RadialVelocityEstimator::with_config(self.library, self.store, self.config.rv.clone());
            estimator
                .estimate(spectrum, &first_guess)
                .context(error::RvTemplateSnafu)?
        };

        // A NaN velocity shifts by zero; classification then repeats on the
        // observed-frame spectrum
        spectrum.shift_to_rest(radial_velocity_kms);

        let lines = measure_lines(spectrum);
        let guess = matcher.classify(spectrum, &lines);
        info!(
            spec_type = guess.spec_type,
            sub_type = guess.sub_type,
            rv = radial_velocity_kms,
            "classified"
        );

        let spec_type = guess.type_label(self.library);
        let metallicity = format!("{:+.1}", guess.metal);
        Ok(SpectrumClassification {
            first_guess,
            radial_velocity_kms,
            guess,
            spec_type,
            metallicity,
            signal_to_noise: sn,
        })
    }

    /// Process a batch of spectra in parallel.
    ///
    /// Spectra are independent; only the read-only library and template
    /// cache are shared. Result order matches input order.
    pub fn process_batch(
        &self,
        spectra: Vec<Spectrum>,
    ) -> Vec<Result<SpectrumClassification, ProcessError>> {
        spectra
            .into_par_iter()
            .map(|mut spectrum| self.process(&mut spectrum))
            .collect()
    }
}
