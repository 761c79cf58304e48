//! Spectral type matching
//!
//! This module implements the inverse-variance-weighted nearest-neighbor
//! search over the template index library.
//!
//! **Algorithm**:
//! 1. Weight each index by `1 / (sqrt(templateVar) + sqrt(observedVar))`,
//!    so noise on either side pushes the weight down
//! 2. Score each template with a normalized weighted sum of squared
//!    residuals over the index vector
//! 3. Pick the minimum-distance template
//! 4. Disambiguate white dwarfs with the Balmer profile fit when the naive
//!    best match is a blue class or already WD
//!
//! Composite (SB2) templates classify like any other row; a winning class
//! index at or above the SB2 range marks the guess as composite.
//!
//! **Module Organization**:
//! - `wd` - Gaussian Balmer profile fit and fit outcome type

pub mod wd;

pub use wd::{fit_balmer_profile, FitOutcome};

use crate::indices::{LineIndexSet, LINE_INDEX_COUNT};
use crate::spectrum::Spectrum;
use crate::templates::{TemplateIndexLibrary, SB2_CLASS_START, SPECTRAL_LETTERS, WD_CLASS_INDEX};
use tracing::{debug, instrument, trace};

/// Gaussian width above which the H-alpha profile is called a white dwarf,
/// in Angstroms. Empirical calibration value from the survey templates
/// (Kesseli et al. 2017), not derived here.
pub const WD_SIGMA_THRESHOLD_ANGSTROMS: f64 = 15.0;

/// Reference Balmer widths of the seven WD subtypes, in Angstroms, from
/// the survey template calibration (Kesseli et al. 2017). Subtype labels
/// run 1 through 7.
pub const WD_REFERENCE_SIGMAS: [f64; 7] = [
    18.3083, 35.6469, 28.7010, 26.8483, 25.3973, 20.2621, 21.1071,
];

/// Classes eligible for the white dwarf check besides WD itself: O, B, A, F.
/// The check is intentionally not extended past these four blue classes.
const WD_CHECK_CLASSES: std::ops::RangeInclusive<i32> = 0..=3;

/// The classification result for one spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    /// Class index, 0 (O) through 9 (WD), >= 10 for composites, -1 unclassifiable
    pub spec_type: i32,
    /// Subtype digit, -1 when unclassifiable
    pub sub_type: i32,
    /// Metallicity [Fe/H]
    pub metal: f64,
    /// Luminosity class, 5 dwarf, 3 giant
    pub luminosity: i32,
    /// Weighted distance of the chosen template (goodness of fit)
    pub distance: f64,
    /// Whether the match is a composite (SB2) template
    pub is_composite: bool,
}

impl Guess {
    /// The explicit "could not classify" sentinel.
    pub fn unclassifiable() -> Self {
        Self {
            spec_type: -1,
            sub_type: -1,
            metal: -1.0,
            luminosity: -1,
            distance: f64::NAN,
            is_composite: false,
        }
    }

    pub fn is_unclassifiable(&self) -> bool {
        self.spec_type < 0
    }

    /// Human-readable type label: "G2" for single stars, the constituent
    /// pair name for composites, "??" when unclassifiable.
    pub fn type_label(&self, library: &TemplateIndexLibrary) -> String {
        if self.is_unclassifiable() {
            return "??".to_string();
        }
        if self.is_composite {
            return library
                .sb2_name(self.spec_type)
                .unwrap_or("??")
                .to_string();
        }
        format!(
            "{}{}",
            SPECTRAL_LETTERS[self.spec_type as usize], self.sub_type
        )
    }
}

/// Nearest-template matcher over a shared read-only library.
pub struct SpectralTypeMatcher<'a> {
    library: &'a TemplateIndexLibrary,
}

impl<'a> SpectralTypeMatcher<'a> {
    pub fn new(library: &'a TemplateIndexLibrary) -> Self {
        Self { library }
    }

    /// Classify one spectrum from its measured line indices.
    ///
    /// Pure apart from the profile fit reading the spectrum's flux; all
    /// failure modes come back as data (the unclassifiable sentinel), never
    /// as an error.
    #[instrument(skip_all)]
    pub fn classify(&self, spectrum: &Spectrum, lines: &LineIndexSet) -> Guess {
        let distances = self.distances(lines);
        let Some(best) = argmin_finite(&distances) else {
            debug!("all template distances undefined");
            return Guess::unclassifiable();
        };

        let class = self.library.class_index(best);
        trace!(best, class, distance = distances[best], "naive best match");

        if WD_CHECK_CLASSES.contains(&class) {
            match fit_balmer_profile(spectrum) {
                FitOutcome::Converged { sigma } if sigma > WD_SIGMA_THRESHOLD_ANGSTROMS => {
                    debug!(sigma, "blue-class match overridden to white dwarf");
                    self.wd_guess(sigma, distances[best])
                }
                FitOutcome::Converged { .. } => self.guess_from(best, &distances),
                FitOutcome::DidNotConverge => self.fallback_non_wd(best, &distances),
            }
        } else if class == WD_CLASS_INDEX {
            match fit_balmer_profile(spectrum) {
                FitOutcome::Converged { sigma } if sigma > WD_SIGMA_THRESHOLD_ANGSTROMS => {
                    self.guess_from(best, &distances)
                }
                _ => {
                    debug!("WD match not confirmed by profile fit");
                    self.fallback_non_wd(best, &distances)
                }
            }
        } else {
            self.guess_from(best, &distances)
        }
    }

    /// Weighted distance of every template to the observed index vector.
    fn distances(&self, lines: &LineIndexSet) -> Vec<f64> {
        let mut distances = Vec::with_capacity(self.library.len());
        for t in 0..self.library.len() {
            let avgs = self.library.averages(t);
            let vars = self.library.variances(t);
            let mut num = 0.0;
            let mut den = 0.0;
            for j in 0..LINE_INDEX_COUNT {
                let weight = 1.0 / (vars[j].sqrt() + lines.variances[j].sqrt());
                if !weight.is_finite() {
                    continue;
                }
                let residual = (lines.values[j] - avgs[j]) * weight;
                if residual.is_finite() {
                    num += residual * residual;
                }
                den += weight * weight;
            }
            distances.push(if den > 0.0 { num / den } else { f64::NAN });
        }
        distances
    }

    fn guess_from(&self, template: usize, distances: &[f64]) -> Guess {
        let class = self.library.class_index(template);
        Guess {
            spec_type: class,
            sub_type: self.library.subtype(template),
            metal: self.library.metallicity(template),
            luminosity: self.library.luminosity(template),
            distance: distances[template],
            is_composite: class >= SB2_CLASS_START,
        }
    }

    fn wd_guess(&self, sigma: f64, distance: f64) -> Guess {
        Guess {
            spec_type: WD_CLASS_INDEX,
            sub_type: wd_subtype_for_sigma(sigma),
            metal: 0.0,
            luminosity: 5,
            distance,
            is_composite: false,
        }
    }

    /// Re-select among the remaining candidates in ascending distance
    /// order, skipping WD-class templates, after a failed or refuted
    /// profile fit.
    fn fallback_non_wd(&self, best: usize, distances: &[f64]) -> Guess {
        let mut order: Vec<usize> = (0..distances.len())
            .filter(|&i| distances[i].is_finite())
            .collect();
        order.sort_by(|&a, &b| {
            distances[a]
                .partial_cmp(&distances[b])
                .unwrap_or(core::cmp::Ordering::Equal)
        });

        for &candidate in order.iter() {
            if candidate == best {
                continue;
            }
            if self.library.class_index(candidate) == WD_CLASS_INDEX {
                continue;
            }
            trace!(candidate, distance = distances[candidate], "fallback match");
            return self.guess_from(candidate, distances);
        }
        debug!("no non-WD fallback candidate available");
        Guess::unclassifiable()
    }
}

/// Nearest WD subtype label (1-7) for a fitted Balmer width.
pub fn wd_subtype_for_sigma(sigma: f64) -> i32 {
    let mut best = 0;
    let mut best_diff = f64::INFINITY;
    for (i, reference) in WD_REFERENCE_SIGMAS.iter().enumerate() {
        let diff = (sigma - reference).abs();
        if diff < best_diff {
            best_diff = diff;
            best = i;
        }
    }
    best as i32 + 1
}

fn argmin_finite(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some(b) if values[b] <= *v => {}
            _ => best = Some(i),
        }
    }
    best
}
