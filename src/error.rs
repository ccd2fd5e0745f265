//! Error taxonomy shared by the library components.
//!
//! Every failure is surfaced synchronously to the immediate caller. The only
//! locally absorbed problem is a malformed row during a dataset load, which
//! becomes a [`RowParseWarning`] instead of an error.

use std::path::PathBuf;
use thiserror::Error;

use crate::record::Column;

/// A raw input field fell outside its declared domain or bound.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// The persisted table could not be loaded at all.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("dataset file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset has no readable header: {0}")]
    Header(String),
    #[error("unknown column `{0}` in dataset header")]
    UnknownColumn(String),
    #[error("column `{0}` appears more than once in dataset header")]
    DuplicateColumn(String),
    #[error("none of the {0} data rows could be parsed")]
    Unparseable(usize),
}

/// A single malformed row skipped during a tolerant load.
#[derive(Debug, Clone, PartialEq)]
pub struct RowParseWarning {
    /// 1-based line number in the source file, header included.
    pub line: u64,
    pub reason: String,
}

/// The inference artifact is missing or unusable; classification cannot be served.
#[derive(Debug, Error)]
pub enum ModelUnavailableError {
    #[error("model artifact not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("model artifact is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("model artifact is invalid: {0}")]
    Invalid(String),
    #[error("model artifact targets the {artifact} catalog but {configured} is configured")]
    CatalogMismatch {
        artifact: &'static str,
        configured: &'static str,
    },
}

/// A structurally valid feature vector could not be scored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("preprocessed feature {0} is not finite")]
    NonFiniteFeature(usize),
    #[error("decision function produced a non-finite score for segment {0}")]
    NonFinite(usize),
    #[error("decision tree walk left the node table at index {0}")]
    BrokenTree(usize),
}

/// A record could not be durably appended. The caller must treat it as not stored.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write dataset row: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode dataset row: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset header is unusable for append: {0}")]
    Header(String),
    #[error("dataset writer lock was poisoned by an earlier failed append")]
    Poisoned,
}

/// A dataset handed to the aggregation engine lacks what the request needs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("required column `{}` is absent from the dataset", .0.header())]
    MissingColumn(Column),
    #[error("column `{}` is not numeric", .0.header())]
    NotNumeric(Column),
    #[error("histogram needs at least one bin")]
    InvalidBins,
}

/// Configuration could not be assembled from the environment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown catalog version `{0}` (expected `five` or `six`)")]
    CatalogVersion(String),
}

/// Per-request failures of the classification boundary.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failures of a report request.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}
