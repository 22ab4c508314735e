//! Error types for task log conversion

use thiserror::Error;
use tracing::warn;

/// Errors that can occur while converting a task log
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Record {record}: missing required field {field}")]
    MissingField { record: usize, field: String },

    #[error("Block {block}: end could not be determined, using {ceiling_ms} ms ceiling")]
    InvalidBlockBoundary { block: String, ceiling_ms: f64 },

    #[error("Block {0} has no trial rows after its cue")]
    EmptyBlock(String),

    #[error("Non-numeric {column} for {trial_type} event after unit conversion")]
    UnitConsistency {
        trial_type: String,
        column: &'static str,
    },

    #[error("Invalid model kind: {0}")]
    InvalidModel(String),

    #[error("Failed to parse task log: {0}")]
    ParseError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid tabular data: {0}")]
    CsvError(#[from] csv::Error),
}

impl ConvertError {
    pub(crate) fn missing(record: usize, field: &str) -> Self {
        ConvertError::MissingField {
            record,
            field: field.to_string(),
        }
    }
}

/// A recoverable problem tied to one source record
#[derive(Debug)]
pub struct RecordIssue {
    /// Position of the offending record in the source log
    pub record: usize,
    pub error: ConvertError,
}

/// Accumulates per-record issues during a single conversion.
///
/// Reporting an issue never aborts the run; the caller gets the full list
/// back alongside the events that could be produced.
#[derive(Debug, Default)]
pub struct Diagnostics {
    issues: Vec<RecordIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue and log it
    pub fn report(&mut self, record: usize, error: ConvertError) {
        warn!(record, %error, "task log issue");
        self.issues.push(RecordIssue { record, error });
    }

    pub fn issues(&self) -> &[RecordIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<RecordIssue> {
        self.issues
    }
}
