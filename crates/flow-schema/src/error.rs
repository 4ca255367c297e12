// error.rs - Error types for schema loading.

use thiserror::Error;

/// Errors that can occur while loading or validating a workflow schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// No schema document exists at the conventional location.
    #[error("schema '{name}' not found at {path}")]
    NotFound { name: String, path: String },

    /// The schema document is not valid YAML.
    #[error("schema '{name}' is not valid YAML: {source}")]
    Yaml {
        name: String,
        source: serde_yaml::Error,
    },

    /// The schema parsed but is structurally invalid.
    #[error("invalid schema '{name}': {reason}")]
    Validation { name: String, reason: String },
}

impl SchemaError {
    pub(crate) fn validation(name: &str, reason: impl Into<String>) -> Self {
        SchemaError::Validation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
