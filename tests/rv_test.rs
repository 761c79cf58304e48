//! Radial velocity recovery on synthetic Doppler-shifted spectra

mod test_utils;

use spectype::classify::Guess;
use spectype::rv::RadialVelocityEstimator;

fn g2_guess() -> Guess {
    Guess {
        spec_type: 4,
        sub_type: 2,
        metal: 0.0,
        luminosity: 5,
        distance: 0.0,
        is_composite: false,
    }
}

#[test]
fn test_velocity_round_trip() {
    let (library, store, _dir) = test_utils::build_test_kit("rv-round-trip");
    let estimator = RadialVelocityEstimator::new(&library, &store);

    for velocity in [-200.0, 0.0, 150.0] {
        let mut spectrum = test_utils::observed_spectrum(5800.0, velocity);
        spectrum.normalize_flux();
        let rv = estimator.estimate(&spectrum, &g2_guess()).unwrap();
        assert!(
            (rv - velocity).abs() <= 2.0,
            "expected {velocity} km/s, measured {rv}"
        );
    }
}

#[test]
fn test_spectrum_too_short_yields_nan() {
    let (library, store, _dir) = test_utils::build_test_kit("rv-short");
    let estimator = RadialVelocityEstimator::new(&library, &store);

    // Coverage ends before the first correlation window
    let wavelength: Vec<f64> = (0..2600).map(|i| 3600.0 + 0.5 * i as f64).collect();
    let flux = test_utils::template_flux(&wavelength, 5800.0);
    let variance = vec![1e-4; wavelength.len()];
    let mut spectrum = spectype::Spectrum::from_raw(wavelength, flux, variance);
    spectrum.normalize_flux();

    let rv = estimator.estimate(&spectrum, &g2_guess()).unwrap();
    assert!(rv.is_nan(), "measured {rv} from an unmeasurable spectrum");
}

#[test]
fn test_missing_template_is_an_error() {
    let (library, store, _dir) = test_utils::build_test_kit("rv-missing");
    let estimator = RadialVelocityEstimator::new(&library, &store);

    let mut guess = g2_guess();
    guess.spec_type = 7; // L0.csv does not exist in the scratch store
    guess.sub_type = 0;
    let spectrum = test_utils::observed_spectrum(5800.0, 0.0);
    assert!(estimator.estimate(&spectrum, &guess).is_err());
}

#[test]
fn test_unclassifiable_guess_yields_nan() {
    let (library, store, _dir) = test_utils::build_test_kit("rv-unclassifiable");
    let estimator = RadialVelocityEstimator::new(&library, &store);

    let spectrum = test_utils::observed_spectrum(5800.0, 0.0);
    let rv = estimator
        .estimate(&spectrum, &Guess::unclassifiable())
        .unwrap();
    assert!(rv.is_nan());
}
