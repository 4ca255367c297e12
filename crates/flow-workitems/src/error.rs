// error.rs - Error types for work-item generation and validation.

use flow_initiative::InitiativeError;
use thiserror::Error;

/// Errors that stop generation, validation, or watching outright.
///
/// Malformed individual source files are not errors; they are skipped.
#[derive(Debug, Error)]
pub enum WorkItemError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// A generated document could not be serialized.
    #[error("YAML error at {path}: {source}")]
    YamlError {
        path: String,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Initiative(#[from] InitiativeError),

    /// The filesystem watcher could not be set up.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
