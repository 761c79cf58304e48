//! Template index library and template flux store
//!
//! The library is the engine's matching data: one row per reference
//! template with its spectral class, subtype, metallicity, luminosity class
//! and the line indices measured on the template's own flux. It is built
//! offline (see the `build_index_table` tool), serialized as JSON, loaded
//! exactly once per run, and shared read-only everywhere after that.
//!
//! Composite (SB2) templates sit above the single-star classes: class index
//! 10 + k refers to the k-th entry of the ordered SB2 name list, whose name
//! encodes the constituent pair ("G0+K5").
//!
//! The flux store reads individual template spectra (CSV columns
//! wavelength, flux, error) for cross-correlation, resamples them onto the
//! canonical grid, and caches the immutable result keyed by name.

use crate::error::{self, LibraryError, TemplateError};
use crate::grid;
use crate::indices::LINE_INDEX_COUNT;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// Letter labels for the single-star classes, ordered by class index.
pub const SPECTRAL_LETTERS: [&str; 10] = ["O", "B", "A", "F", "G", "K", "M", "L", "C", "WD"];

/// Class index of white dwarfs
pub const WD_CLASS_INDEX: i32 = 9;

/// First class index used by composite (SB2) templates
pub const SB2_CLASS_START: i32 = 10;

/// One row of the serialized index table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub class_index: i32,
    pub subtype: i32,
    pub metallicity: f64,
    pub luminosity: i32,
    pub values: Vec<f64>,
    pub variances: Vec<f64>,
}

/// On-disk shape of the index table.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexTable {
    pub sb2_names: Vec<String>,
    pub templates: Vec<TemplateRecord>,
}

/// In-memory, immutable matching data for every reference template.
#[derive(Debug)]
pub struct TemplateIndexLibrary {
    sb2_names: Vec<String>,
    class_indices: Vec<i32>,
    subtypes: Vec<i32>,
    metallicities: Vec<f64>,
    luminosities: Vec<i32>,
    averages: Vec<[f64; LINE_INDEX_COUNT]>,
    variances: Vec<[f64; LINE_INDEX_COUNT]>,
}

impl TemplateIndexLibrary {
    /// Load the library from a serialized index table.
    ///
    /// Any failure here is fatal for the engine; surface it at startup.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let raw = std::fs::read_to_string(path).context(error::ReadSnafu { path })?;
        let table: IndexTable = serde_json::from_str(&raw).context(error::ParseSnafu { path })?;
        let library = Self::from_table(table)?;
        info!(
            templates = library.len(),
            sb2 = library.sb2_names.len(),
            "template index library loaded"
        );
        Ok(library)
    }

    /// Build the library from an already-deserialized table.
    pub fn from_table(table: IndexTable) -> Result<Self, LibraryError> {
        let count = table.templates.len();
        let mut library = Self {
            sb2_names: table.sb2_names,
            class_indices: Vec::with_capacity(count),
            subtypes: Vec::with_capacity(count),
            metallicities: Vec::with_capacity(count),
            luminosities: Vec::with_capacity(count),
            averages: Vec::with_capacity(count),
            variances: Vec::with_capacity(count),
        };

        for (i, record) in table.templates.into_iter().enumerate() {
            if record.values.len() != LINE_INDEX_COUNT {
                return error::IndexAritySnafu {
                    template: i,
                    got: record.values.len(),
                    expected: LINE_INDEX_COUNT,
                }
                .fail();
            }
            if record.variances.len() != LINE_INDEX_COUNT {
                return error::IndexAritySnafu {
                    template: i,
                    got: record.variances.len(),
                    expected: LINE_INDEX_COUNT,
                }
                .fail();
            }
            if record.class_index >= SB2_CLASS_START {
                let name_index = (record.class_index - SB2_CLASS_START) as usize;
                if name_index >= library.sb2_names.len() {
                    return error::Sb2NameSnafu {
                        template: i,
                        name_index,
                    }
                    .fail();
                }
            }

            let mut avg = [0.0; LINE_INDEX_COUNT];
            let mut var = [0.0; LINE_INDEX_COUNT];
            avg.copy_from_slice(&record.values);
            var.copy_from_slice(&record.variances);

            library.class_indices.push(record.class_index);
            library.subtypes.push(record.subtype);
            library.metallicities.push(record.metallicity);
            library.luminosities.push(record.luminosity);
            library.averages.push(avg);
            library.variances.push(var);
        }

        Ok(library)
    }

    pub fn len(&self) -> usize {
        self.class_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_indices.is_empty()
    }

    pub fn class_index(&self, template: usize) -> i32 {
        self.class_indices[template]
    }

    pub fn subtype(&self, template: usize) -> i32 {
        self.subtypes[template]
    }

    pub fn metallicity(&self, template: usize) -> f64 {
        self.metallicities[template]
    }

    pub fn luminosity(&self, template: usize) -> i32 {
        self.luminosities[template]
    }

    /// Per-index averages of one template, in the fixed index order.
    pub fn averages(&self, template: usize) -> &[f64; LINE_INDEX_COUNT] {
        &self.averages[template]
    }

    /// Per-index variances of one template, in the fixed index order.
    pub fn variances(&self, template: usize) -> &[f64; LINE_INDEX_COUNT] {
        &self.variances[template]
    }

    /// Name of a composite template ("G0+K5") given its class index.
    pub fn sb2_name(&self, class_index: i32) -> Option<&str> {
        if class_index < SB2_CLASS_START {
            return None;
        }
        self.sb2_names
            .get((class_index - SB2_CLASS_START) as usize)
            .map(String::as_str)
    }

    /// Constituent spectral types of a composite template, recovered from
    /// its name. Metallicity-like tokens after either type are dropped,
    /// so "G0+K5_+0.0" yields ("G0", "K5").
    pub fn sb2_pair(&self, class_index: i32) -> Option<(String, String)> {
        let name = self.sb2_name(class_index)?;
        let mut parts = name.split('+');
        let first = parts.next()?;
        let second = parts.next()?;
        let type_token = |s: &str| {
            s.split(['_', '.'])
                .next()
                .unwrap_or(s)
                .to_string()
        };
        Some((type_token(first), type_token(second)))
    }
}

/// Split a spectral type string into letter class and trailing digits,
/// "G2" -> ("G", "2"). Two-letter classes like "WD" keep both letters.
pub fn split_spec_type(s: &str) -> (&str, &str) {
    let head_len = s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    s.split_at(head_len)
}

/// One template spectrum on the canonical grid. Immutable once cached.
#[derive(Debug)]
pub struct TemplateSpectrum {
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
}

/// Read-through cache of template flux files.
///
/// Entries are immutable `Arc`s, so a single store can back every spectrum
/// in a parallel batch; spectra that share a best-match template share one
/// file read.
pub struct TemplateStore {
    dir: PathBuf,
    sb2_dir: PathBuf,
    cache: Mutex<LruCache<String, Arc<TemplateSpectrum>>>,
}

/// Number of gridded template spectra kept in memory
const TEMPLATE_CACHE_SIZE: usize = 16;

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>, sb2_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sb2_dir: sb2_dir.into(),
            cache: Mutex::new(LruCache::new(TEMPLATE_CACHE_SIZE)),
        }
    }

    /// Fetch a template's gridded spectrum by file name, reading and
    /// resampling on first use.
    pub fn gridded(&self, name: &str, sb2: bool) -> Result<Arc<TemplateSpectrum>, TemplateError> {
        let key = if sb2 {
            format!("sb2/{name}")
        } else {
            name.to_string()
        };

        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            return Ok(Arc::clone(hit));
        }

        let dir = if sb2 { &self.sb2_dir } else { &self.dir };
        let path = dir.join(name);
        debug!(path = %path.display(), "reading template flux");
        let (wavelength, flux, variance) = read_template_csv(&path)?;
        let (wavelength, flux, _) = grid::resample(&wavelength, &flux, &variance);
        let template = Arc::new(TemplateSpectrum { wavelength, flux });
        self.cache.lock().unwrap().put(key, Arc::clone(&template));
        Ok(template)
    }
}

/// Read a template flux CSV with columns wavelength, flux and optional
/// error (converted to variance).
pub fn read_template_csv(path: &Path) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), TemplateError> {
    let file = std::fs::File::open(path).context(error::OpenSnafu { path })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut wavelength = Vec::new();
    let mut flux = Vec::new();
    let mut variance = Vec::new();
    for row in reader.records() {
        let row = row.context(error::MalformedSnafu { path })?;
        let parse = |i: usize| row.get(i).and_then(|v| v.trim().parse::<f64>().ok());
        let (Some(w), Some(f)) = (parse(0), parse(1)) else {
            continue;
        };
        wavelength.push(w);
        flux.push(f);
        variance.push(match parse(2) {
            Some(err) => err * err,
            // Simple Poisson-like floor when no error column is present
            None => {
                let err = f.abs().powf(0.05) + 1e-16;
                err * err
            }
        });
    }

    if wavelength.is_empty() {
        return error::EmptySnafu { path }.fail();
    }
    Ok((wavelength, flux, variance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(class_index: i32) -> TemplateRecord {
        TemplateRecord {
            class_index,
            subtype: 2,
            metallicity: 0.0,
            luminosity: 5,
            values: vec![1.0; LINE_INDEX_COUNT],
            variances: vec![0.01; LINE_INDEX_COUNT],
        }
    }

    #[test]
    fn test_split_spec_type() {
        assert_eq!(split_spec_type("G2"), ("G", "2"));
        assert_eq!(split_spec_type("WD7"), ("WD", "7"));
        assert_eq!(split_spec_type("M"), ("M", ""));
    }

    #[test]
    fn test_from_table_round_trip() {
        let table = IndexTable {
            sb2_names: vec!["G0+K5".into()],
            templates: vec![record(4), record(10)],
        };
        let library = TemplateIndexLibrary::from_table(table).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.class_index(0), 4);
        assert_eq!(library.subtype(0), 2);
        assert_eq!(library.sb2_name(10), Some("G0+K5"));
        assert_eq!(
            library.sb2_pair(10),
            Some(("G0".to_string(), "K5".to_string()))
        );
    }

    #[test]
    fn test_from_table_rejects_wrong_arity() {
        let mut bad = record(4);
        bad.values.pop();
        let table = IndexTable {
            sb2_names: vec![],
            templates: vec![bad],
        };
        assert!(TemplateIndexLibrary::from_table(table).is_err());
    }

    #[test]
    fn test_from_table_rejects_missing_sb2_name() {
        let table = IndexTable {
            sb2_names: vec![],
            templates: vec![record(10)],
        };
        assert!(TemplateIndexLibrary::from_table(table).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let table = IndexTable {
            sb2_names: vec!["A3+F2".into()],
            templates: vec![record(4)],
        };
        let json = serde_json::to_string(&table).unwrap();
        let back: IndexTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sb2_names, vec!["A3+F2".to_string()]);
        assert_eq!(back.templates.len(), 1);
    }
}
