//! Offline template index table builder
//!
//! Scans a directory of template flux files (CSV columns wavelength, flux,
//! optional error), measures the full line index vocabulary on each, and
//! serializes the library JSON consumed at classification time.
//!
//! Template parameters are encoded in the file names:
//! - `G2_+0.0_Dwarf.csv` - class G, subtype 2, [Fe/H] +0.0, main sequence
//! - `M9.csv` - no metallicity axis
//! - `WD3.csv` - white dwarf subtype 3
//!
//! Files in the SB2 directory are composite templates; their stems name the
//! constituent pair ("G0+K5") and they take class indices 10 upward in
//! directory order.

use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;

use spectype::indices::measure_lines;
use spectype::spectrum::Spectrum;
use spectype::templates::{
    read_template_csv, split_spec_type, IndexTable, TemplateRecord, SB2_CLASS_START,
    SPECTRAL_LETTERS,
};
use tracing::info;

fn main() {
    spectype::tracing_init::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <templates_dir> <sb2_templates_dir> <output.json>",
            args[0]
        );
        exit(1);
    }
    let templates_dir = PathBuf::from(&args[1]);
    let sb2_dir = PathBuf::from(&args[2]);
    let output = PathBuf::from(&args[3]);

    let mut table = IndexTable {
        sb2_names: Vec::new(),
        templates: Vec::new(),
    };

    for path in sorted_csv_files(&templates_dir) {
        let stem = file_stem(&path);
        let Some((class_index, subtype, metallicity, luminosity)) = parse_template_name(&stem)
        else {
            eprintln!("Skipping unrecognized template name: {stem}");
            continue;
        };
        let record = match measure_template(&path) {
            Ok((values, variances)) => TemplateRecord {
                class_index,
                subtype,
                metallicity,
                luminosity,
                values,
                variances,
            },
            Err(message) => {
                eprintln!("{message}");
                exit(1);
            }
        };
        info!(template = %stem, class_index, subtype, metallicity, "measured");
        table.templates.push(record);
    }

    for (i, path) in sorted_csv_files(&sb2_dir).into_iter().enumerate() {
        let stem = file_stem(&path);
        let record = match measure_template(&path) {
            Ok((values, variances)) => TemplateRecord {
                class_index: SB2_CLASS_START + i as i32,
                subtype: 0,
                metallicity: 0.0,
                luminosity: 5,
                values,
                variances,
            },
            Err(message) => {
                eprintln!("{message}");
                exit(1);
            }
        };
        info!(template = %stem, class_index = record.class_index, "measured SB2");
        table.sb2_names.push(stem);
        table.templates.push(record);
    }

    if table.templates.is_empty() {
        eprintln!("No templates found under {}", templates_dir.display());
        exit(1);
    }

    let json = serde_json::to_string_pretty(&table).expect("index table serializes");
    if let Err(e) = std::fs::write(&output, json) {
        eprintln!("Unable to write {}: {e}", output.display());
        exit(1);
    }
    info!(
        templates = table.templates.len(),
        output = %output.display(),
        "index table written"
    );
}

fn sorted_csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect(),
        Err(e) => {
            eprintln!("Unable to read {}: {e}", dir.display());
            exit(1);
        }
    };
    files.sort();
    files
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse class, subtype, metallicity and luminosity from a template stem.
fn parse_template_name(stem: &str) -> Option<(i32, i32, f64, i32)> {
    let mut parts = stem.split('_');
    let spec = parts.next()?;
    let (letter, digits) = split_spec_type(spec);
    let class_index = SPECTRAL_LETTERS.iter().position(|&l| l == letter)? as i32;
    let subtype: i32 = digits.parse().ok()?;

    let metallicity = match parts.next() {
        Some(token) => token.parse::<f64>().ok()?,
        None => 0.0,
    };
    let luminosity = match parts.next() {
        Some("Giant") => 3,
        _ => 5,
    };
    Some((class_index, subtype, metallicity, luminosity))
}

/// Measure the line index vocabulary on one normalized template spectrum.
fn measure_template(path: &Path) -> Result<(Vec<f64>, Vec<f64>), String> {
    let (wavelength, flux, variance) =
        read_template_csv(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut spectrum = Spectrum::from_raw(wavelength, flux, variance);
    spectrum.normalize_flux();
    let lines = measure_lines(&spectrum);
    Ok((lines.values.to_vec(), lines.variances.to_vec()))
}
