//! # flow-engine
//!
//! The rules engine of Initiative Flow. Everything here is computed from the
//! filesystem on every call; nothing is cached between queries.
//!
//! - [`StatusEngine`]: per-artifact `done` / `ready` / `blocked` status, tier
//!   roll-ups, and the full initiative status with the next suggested action.
//! - [`GateChecker`]: evaluates a gate's declarative criteria against artifact
//!   files and fails any gate while escalations are open.
//! - [`TransitionEngine`]: validates and applies stage transitions, running
//!   the required gate and serializing writers with a per-initiative lock.

pub mod document;
pub mod error;
pub mod gates;
pub mod status;
pub mod transition;

pub use document::ArtifactTree;
pub use error::EngineError;
pub use gates::{GateCheckResult, GateChecker, GateCriterionResult};
pub use status::{
    ArtifactStatus, ArtifactStatusResult, GateProgress, GateStatus, InitiativeStatusResult,
    NextAction, StatusEngine, TierStatusResult,
};
pub use transition::{TransitionEngine, TransitionResult, TransitionValidation};
