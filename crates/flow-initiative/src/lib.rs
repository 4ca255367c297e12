//! # flow-initiative
//!
//! Initiative lifecycle state for Initiative Flow.
//!
//! An initiative moves through sixteen [`Stage`]s: `draft`, then an
//! active/approved/blocked triple per tier (tier 4 adds `review`), and finally
//! `completed` or `cancelled`. This crate owns the stage enumeration and its
//! transition tables, the persisted [`InitiativeState`] document, and the
//! on-disk [`InitiativeStore`] that reads and writes it.
//!
//! ## Key components
//!
//! - [`Stage`]: the lifecycle enumeration, transition table, and gate requirements
//! - [`InitiativeState`]: metadata, current stage, history, escalations, blockers
//! - [`InitiativeStore`]: YAML persistence under `openspec/initiatives/<id>/`
//! - [`FlowConfig`] / [`ProjectConfig`]: path layout and project settings
//! - [`FlowEvent`] / [`EventDispatcher`]: lifecycle notifications

pub mod config;
pub mod error;
pub mod events;
pub mod stage;
pub mod state;
pub mod store;

pub use config::{FlowConfig, ProjectConfig, WorkItemsSettings};
pub use error::InitiativeError;
pub use events::{EventDispatcher, FlowEvent, LogSink, NotificationSink};
pub use stage::Stage;
pub use state::{
    Escalation, InitiativeMetadata, InitiativeState, Mode, Severity, StageTransition,
};
pub use store::{InitiativeStore, StateLock};
