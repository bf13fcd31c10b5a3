use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide errors for loading data and configuring the analytics engine.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The configured data path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No `.json` / `.jsonl` files were found under the given directory.
    #[error("No data files found in {0}")]
    NoDataFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a single raw record was dropped during normalisation.
///
/// Never aborts a batch: the normaliser counts these and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid timestamp in field {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// A batch-level failure. The previously published snapshot stays in place.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The input is not a collection of records.
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// The assembled snapshot broke one of its own invariants.
    #[error("Inconsistent snapshot: {}", .0.join("; "))]
    Inconsistent(Vec<String>),

    /// Another refresh is in flight.
    #[error("A refresh is already in progress")]
    Busy,

    /// The data source could not supply a batch.
    #[error("Data source failed: {0}")]
    Source(#[from] AnalyticsError),
}

/// Returned by `current()` before the first successful refresh.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No analytics snapshot has been published yet")]
pub struct NotYetAvailable;

/// Convenience alias used throughout the booking crates.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
