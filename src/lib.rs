//! Cleaning and significance testing for quarterly honeybee colony census data.
//!
//! Raw per-state census rows are joined with a region lookup, normalized,
//! repaired per state by linear interpolation, and have their derived
//! percentages and counts rebuilt. The resulting canonical dataset feeds the
//! aggregate reports and the group-versus-population stressor tests.
pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod interpolate;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod region;
pub mod reports;
pub mod significance;
pub mod types;
pub mod util;

pub use error::{DataQualityIssue, Error, Result};
pub use normalize::Dataset;
pub use pipeline::PipelineOutput;
