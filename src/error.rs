//! Error types for the classification engine
//!
//! Only failures the engine cannot recover from locally are typed errors.
//! Unmeasurable indices, unconverged profile fits and uncoverable
//! correlation windows are all handled in-band with sentinel values.

use snafu::Snafu;
use std::path::PathBuf;

/// Failure to construct the template index library. Always fatal: the
/// engine cannot classify anything without its matching data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LibraryError {
    /// Index table file could not be read
    #[snafu(display("unable to read index table {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Index table file is not valid JSON
    #[snafu(display("index table {} is malformed: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A template row carries the wrong number of line indices
    #[snafu(display(
        "template {template} carries {got} line indices, expected {expected}"
    ))]
    IndexArity {
        template: usize,
        got: usize,
        expected: usize,
    },

    /// A composite template points past the end of the SB2 name list
    #[snafu(display("template {template} references missing SB2 name {name_index}"))]
    Sb2Name { template: usize, name_index: usize },
}

/// Failure to load a template flux file for cross-correlation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TemplateError {
    /// Template flux file could not be opened
    #[snafu(display("unable to open template {}: {source}", path.display()))]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Template flux file could not be parsed
    #[snafu(display("unable to parse template {}: {source}", path.display()))]
    Malformed {
        path: PathBuf,
        source: csv::Error,
    },

    /// Template flux file contained no usable rows
    #[snafu(display("template {} has no usable samples", path.display()))]
    Empty { path: PathBuf },
}

/// Per-spectrum rejection reason produced by the pipeline. These are data
/// for the orchestrator's reject report, not faults.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProcessError {
    /// Spectrum failed the signal-to-noise cut
    #[snafu(display("signal to noise {sn:.1} below cut {cut:.1}"))]
    LowSignalToNoise { sn: f64, cut: f64 },

    /// The radial velocity template could not be loaded
    #[snafu(display("radial velocity template unavailable: {source}"))]
    RvTemplate { source: TemplateError },
}
