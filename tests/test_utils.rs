//! Shared utilities for integration tests
//!
//! Builds a small synthetic template family with strongly
//! temperature-dependent line depths, writes the template flux files to a
//! scratch directory, and assembles the matching index library in memory.

#![allow(dead_code)]

use spectype::indices::measure_lines;
use spectype::simulation;
use spectype::spectrum::Spectrum;
use spectype::templates::{IndexTable, TemplateIndexLibrary, TemplateRecord, TemplateStore};
use std::path::PathBuf;

/// (class index, subtype, metallicity, file name, temperature K)
pub const TEST_TEMPLATES: [(i32, i32, f64, &str, f64); 7] = [
    (3, 5, -1.0, "F5_-1.0_Dwarf.csv", 6500.0),
    (4, 0, 0.0, "G0_+0.0_Dwarf.csv", 6000.0),
    (4, 2, 0.0, "G2_+0.0_Dwarf.csv", 5800.0),
    (4, 5, 0.0, "G5_+0.0_Dwarf.csv", 5600.0),
    (5, 2, 0.0, "K2_+0.0_Dwarf.csv", 5000.0),
    (5, 5, 0.0, "K5_+0.0_Dwarf.csv", 4500.0),
    (6, 1, 0.0, "M1_+0.0_Dwarf.csv", 3800.0),
];

/// Per-pixel flux error of the synthetic spectra
pub const FLUX_ERROR: f64 = 0.01;

/// Raw (pre-grid) wavelengths covering the full canonical range.
pub fn raw_wavelength() -> Vec<f64> {
    (0..13_301).map(|i| 3600.0 + 0.5 * i as f64).collect()
}

/// Synthetic stellar flux: smooth continuum plus absorption lines whose
/// depths vary steeply with temperature, so neighboring templates are well
/// separated in index space.
pub fn template_flux(wavelength: &[f64], temperature: f64) -> Vec<f64> {
    let mut flux = simulation::continuum(wavelength, temperature);
    let clamp = |d: f64| d.clamp(0.0, 0.9);

    // Hot-star features fade toward cooler temperatures
    let balmer = clamp((temperature - 3000.0) / 4000.0);
    simulation::absorb(wavelength, &mut flux, 6564.5, balmer, 8.0);
    simulation::absorb(wavelength, &mut flux, 4862.7, 0.8 * balmer, 8.0);
    simulation::absorb(wavelength, &mut flux, 4341.7, 0.6 * balmer, 8.0);

    // Cool-star features grow toward cooler temperatures
    simulation::absorb(
        wavelength,
        &mut flux,
        3934.8,
        clamp((7000.0 - temperature) / 4000.0),
        8.0,
    );
    simulation::absorb(
        wavelength,
        &mut flux,
        5174.0,
        clamp((6500.0 - temperature) / 4000.0),
        10.0,
    );
    simulation::absorb(
        wavelength,
        &mut flux,
        5894.0,
        clamp((6200.0 - temperature) / 4000.0),
        8.0,
    );
    simulation::absorb(
        wavelength,
        &mut flux,
        6162.0,
        clamp((6000.0 - temperature) / 5000.0),
        8.0,
    );
    simulation::absorb(
        wavelength,
        &mut flux,
        8190.0,
        clamp((5600.0 - temperature) / 4000.0),
        8.0,
    );

    // Molecular bands of the coolest templates
    simulation::absorb(
        wavelength,
        &mut flux,
        7131.0,
        clamp((4800.0 - temperature) / 2000.0),
        6.0,
    );
    simulation::absorb(
        wavelength,
        &mut flux,
        8440.0,
        clamp((4600.0 - temperature) / 2000.0),
        10.0,
    );

    flux
}

/// Write one template CSV with wavelength, flux and error columns.
pub fn write_template_csv(path: &std::path::Path, wavelength: &[f64], flux: &[f64]) {
    let mut out = String::from("wavelength,flux,error\n");
    for (w, f) in wavelength.iter().zip(flux) {
        out.push_str(&format!("{w},{f},{FLUX_ERROR}\n"));
    }
    std::fs::write(path, out).expect("template csv written");
}

/// Build the synthetic template library and flux store under a scratch
/// directory unique to `tag`.
pub fn build_test_kit(tag: &str) -> (TemplateIndexLibrary, TemplateStore, PathBuf) {
    let dir = std::env::temp_dir().join(format!("spectype-test-{tag}-{}", std::process::id()));
    let sb2_dir = dir.join("sb2");
    std::fs::create_dir_all(&sb2_dir).expect("scratch dir created");

    let wavelength = raw_wavelength();
    let mut table = IndexTable {
        sb2_names: Vec::new(),
        templates: Vec::new(),
    };

    for (class_index, subtype, metallicity, name, temperature) in TEST_TEMPLATES {
        let flux = template_flux(&wavelength, temperature);
        write_template_csv(&dir.join(name), &wavelength, &flux);
        table.templates.push(measure_record(
            &wavelength,
            &flux,
            class_index,
            subtype,
            metallicity,
        ));
    }

    // One composite: an even blend of G0 and K5
    let g0 = template_flux(&wavelength, 6000.0);
    let k5 = template_flux(&wavelength, 4500.0);
    let blend: Vec<f64> = g0.iter().zip(&k5).map(|(a, b)| (a + b) / 2.0).collect();
    write_template_csv(&sb2_dir.join("G0+K5.csv"), &wavelength, &blend);
    table.sb2_names.push("G0+K5".to_string());
    table
        .templates
        .push(measure_record(&wavelength, &blend, 10, 0, 0.0));

    let library = TemplateIndexLibrary::from_table(table).expect("library built");
    let store = TemplateStore::new(&dir, &sb2_dir);
    (library, store, dir)
}

fn measure_record(
    wavelength: &[f64],
    flux: &[f64],
    class_index: i32,
    subtype: i32,
    metallicity: f64,
) -> TemplateRecord {
    let variance = vec![FLUX_ERROR * FLUX_ERROR; wavelength.len()];
    let mut spectrum = Spectrum::from_raw(wavelength.to_vec(), flux.to_vec(), variance);
    spectrum.normalize_flux();
    let lines = measure_lines(&spectrum);
    TemplateRecord {
        class_index,
        subtype,
        metallicity,
        luminosity: 5,
        values: lines.values.to_vec(),
        variances: lines.variances.to_vec(),
    }
}

/// An observed spectrum built from a template temperature, optionally
/// Doppler shifted.
pub fn observed_spectrum(temperature: f64, velocity_kms: f64) -> Spectrum {
    let mut wavelength = raw_wavelength();
    let flux = template_flux(&wavelength, temperature);
    simulation::doppler_shift(&mut wavelength, velocity_kms);
    let variance = vec![FLUX_ERROR * FLUX_ERROR; wavelength.len()];
    Spectrum::from_raw(wavelength, flux, variance)
}
