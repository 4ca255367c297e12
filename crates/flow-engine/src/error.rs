// error.rs - Error types for status, gate, and transition queries.
//
// Unmet gates and rejected transitions are not errors; they come back as
// `GateCheckResult` / `TransitionValidation` values. Errors here mean a query
// could not be answered at all.

use flow_initiative::InitiativeError;
use flow_schema::{GateId, SchemaError, Tier};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Initiative state could not be loaded or saved.
    #[error(transparent)]
    Initiative(#[from] InitiativeError),

    #[error("artifact '{0}' not found in schema")]
    ArtifactNotFound(String),

    #[error("tier '{0}' not found in schema")]
    TierNotFound(Tier),

    #[error("gate '{0}' not found in schema")]
    GateNotFound(GateId),

    /// A `generates` or criterion pattern is not a valid glob.
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },
}
