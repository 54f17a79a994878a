//! Error types for the ingestion pipeline
//!
//! Connection and schema management use `anyhow` like the rest of the outer
//! layers. The ingestion core reports through [`IngestError`] so callers can
//! tell a bad record from a bad prefix from a storage failure.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Errors raised while normalizing, expanding or persisting announcements
#[derive(Error, Debug)]
pub enum IngestError {
    /// A raw entry is missing a required field or carries the wrong type.
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    /// The batch as a whole is not a JSON array of records.
    #[error("malformed batch: {reason}")]
    MalformedBatch { reason: String },

    /// A prefix string does not parse as an IP network.
    #[error("invalid prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    /// Any storage-layer failure. The in-flight file transaction is rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// A raw file could not be read.
    #[error("unable to read raw file '{path}': {reason}")]
    RawInput { path: String, reason: String },

    /// Every file handed to the pipeline failed.
    #[error("all {failed} raw file(s) failed, first failure: {first}")]
    AllFilesFailed { failed: usize, first: String },
}

impl IngestError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::MalformedRecord { .. } => "malformed_record",
            IngestError::MalformedBatch { .. } => "malformed_batch",
            IngestError::InvalidPrefix { .. } => "invalid_prefix",
            IngestError::Persistence(_) => "persistence",
            IngestError::RawInput { .. } => "raw_input",
            IngestError::AllFilesFailed { .. } => "all_files_failed",
        }
    }
}
