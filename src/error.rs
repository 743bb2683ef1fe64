//! Error types for the filtering core.

use crate::count_table::{OccurrenceKey, VariantId};
use crate::filter::FilterKind;
use thiserror::Error;

/// Coarse classification of a [`FilterError`].
///
/// Configuration and data-integrity errors are always fatal. An upstream error
/// is fatal only when the stage that hit it is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    DataIntegrity,
    UpstreamUnavailable,
    Io,
}

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid cutoff {value} for filter '{filter}': ratio cutoffs must lie in [0, 1]")]
    InvalidCutoff { filter: FilterKind, value: f64 },

    #[error("Filter '{filter}' requires an explicit cutoff for {key}, none was configured")]
    MissingOverride { filter: FilterKind, key: String },

    #[error("Filter '{0}' is in the cascade order but its parameters are not configured")]
    MissingFilterParams(FilterKind),

    #[error("Unknown filter name '{0}'")]
    UnknownFilter(String),

    #[error("Invalid filter order: {0}")]
    FilterOrder(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Duplicate occurrence {0}")]
    DuplicateOccurrence(OccurrenceKey),

    #[error("Negative read count {value} for occurrence {key}")]
    NegativeReadCount { key: OccurrenceKey, value: i64 },

    #[error("Variant {0} has no sequence")]
    MissingSequence(VariantId),

    #[error("Variant {0} is defined more than once")]
    DuplicateVariant(VariantId),

    #[error("Neighbor-pair collaborator unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FilterError::InvalidCutoff { .. }
            | FilterError::MissingOverride { .. }
            | FilterError::MissingFilterParams(_)
            | FilterError::UnknownFilter(_)
            | FilterError::FilterOrder(_)
            | FilterError::InvalidParameter(_) => ErrorKind::Configuration,
            FilterError::DuplicateOccurrence(_)
            | FilterError::NegativeReadCount { .. }
            | FilterError::MissingSequence(_)
            | FilterError::DuplicateVariant(_) => ErrorKind::DataIntegrity,
            FilterError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            FilterError::Io(_)
            | FilterError::Csv(_)
            | FilterError::Yaml(_)
            | FilterError::Json(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, FilterError>;
