
pub mod classify;
pub mod error;
pub mod grid;
pub mod indices;
pub mod pipeline;
pub mod rv;
pub mod simulation;
pub mod spectrum;
pub mod templates;
pub mod tracing_init;

pub use classify::{Guess, SpectralTypeMatcher};
pub use indices::{measure_lines, LineIndexSet};
pub use pipeline::{Pipeline, PipelineConfig, SpectrumClassification};
pub use rv::{RadialVelocityEstimator, RvConfig};
pub use spectrum::Spectrum;
pub use templates::{TemplateIndexLibrary, TemplateStore};
