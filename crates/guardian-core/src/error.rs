use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by Cloud Cost Guardian.
///
/// Only I/O-facing operations return these. Normalization, derivation and
/// aggregation never fail: bad cells become missing values instead.
#[derive(Error, Debug)]
pub enum GuardianError {
    /// A report file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be created.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV document could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed or serialized.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The configured report directory does not exist.
    #[error("Report directory not found: {0}")]
    ReportDirNotFound(PathBuf),

    /// No CSV reports were found under the given directory.
    #[error("No CSV reports found in {0}")]
    NoReports(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the guardian crates.
pub type Result<T> = std::result::Result<T, GuardianError>;
