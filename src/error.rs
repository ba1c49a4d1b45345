// Error types for the census pipeline.
//
// Two tiers:
// - `Error` is fatal. Configuration and structural problems (a state with no
//   region, a bad grouping key, an unreadable file) stop the run.
// - `DataQualityIssue` is recoverable. The affected value is left missing,
//   the issue is handed back to the caller, and processing continues.
use crate::types::{BaseColumn, DerivedColumn, Period};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no region mapping for state '{state}'")]
    MissingRegionMapping { state: String },

    #[error("state '{state}' has {count} region mappings, expected exactly one")]
    AmbiguousRegionMapping { state: String, count: usize },

    #[error("invalid grouping key '{0}' (expected 'quarter' or 'region')")]
    InvalidGroupingKey(String),

    #[error("state '{state}' maps to unknown region '{region}'")]
    InvalidRegion { state: String, region: String },

    #[error("unknown stressor '{0}'")]
    InvalidStressor(String),

    #[error("duplicate record for state '{state}' in period {period}")]
    DuplicateRecord { state: String, period: Period },

    #[error("invalid period label '{0}' (expected YYYYQn)")]
    InvalidPeriod(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable data problem attached to one state (and, for metrics, one period).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataQualityIssue {
    #[error("{state}: column '{column}' has no observed values, left missing")]
    UnresolvableGap { state: String, column: BaseColumn },

    #[error("{state} {period}: initial_count is zero, '{metric}' is undefined")]
    DivisionByZeroMetric {
        state: String,
        period: Period,
        metric: DerivedColumn,
    },
}

impl DataQualityIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnresolvableGap { .. } => "unresolvable_gap",
            Self::DivisionByZeroMetric { .. } => "division_by_zero",
        }
    }

    pub fn state(&self) -> &str {
        match self {
            Self::UnresolvableGap { state, .. } | Self::DivisionByZeroMetric { state, .. } => state,
        }
    }
}
