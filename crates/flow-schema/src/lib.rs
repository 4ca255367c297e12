//! # flow-schema
//!
//! Declarative workflow schemas for Initiative Flow.
//!
//! A [`Schema`] describes the four planning tiers, the artifacts each tier
//! produces (with their file patterns and dependencies), and the gates that
//! guard progress between tiers. Schemas are loaded from
//! `<schemas_dir>/<name>/schema.yaml` and are immutable once loaded.
//!
//! ## Key components
//!
//! - [`SchemaLoader`] - locates and validates schema documents
//! - [`Schema`] - typed schema with lookup views and a topological artifact order
//! - [`Tier`] / [`GateId`] - the closed tier and gate enumerations
//! - [`GateCriterion`] - the machine-checkable predicates a gate is made of

pub mod error;
pub mod ids;
pub mod loader;
mod order;
pub mod schema;

pub use error::SchemaError;
pub use ids::{GateId, Tier};
pub use loader::{parse_schema, SchemaLoader};
pub use schema::{
    ApplySection, ArchiveSection, ArtifactDefinition, CriterionCheck, GateCriterion,
    GateDefinition, Schema, TierDefinition, TierSkills,
};
