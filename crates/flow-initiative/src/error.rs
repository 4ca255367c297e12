// error.rs - Error types for initiative state and storage.

use thiserror::Error;

/// Errors that can occur while reading or writing initiative state.
#[derive(Debug, Error)]
pub enum InitiativeError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// A state or config document could not be (de)serialized.
    #[error("YAML error at {path}: {source}")]
    YamlError {
        path: String,
        source: serde_yaml::Error,
    },

    /// An event could not be serialized for a notification sink.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The requested initiative has no state file.
    #[error("initiative not found: {0}")]
    NotFound(String),

    /// An initiative with this id already exists.
    #[error("initiative already exists: {0}")]
    AlreadyExists(String),
}
