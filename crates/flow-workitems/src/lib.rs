//! # flow-workitems
//!
//! Converts an initiative's tier artifacts (epics in `tier2/epics/`, stories
//! and tasks in `tier3/`) into a tool-agnostic work-item tree under
//! `<initiative>/workitems/`, and validates that tree.
//!
//! Work items get hierarchical ids (`1`, `1.2`, `1.2.3`) followed by a slug of
//! the title. Ids are reassigned from scratch on every generation, so they
//! follow the current ordering of the source files rather than being stable.
//!
//! - [`WorkItemGenerator`]: destructive regenerate of the tree and manifest
//! - [`WorkItemValidator`]: structural checks over a generated tree
//! - [`WorkItemWatcher`]: debounced regeneration when source artifacts change

pub mod error;
pub mod generate;
mod source;
pub mod types;
pub mod validate;
pub mod watch;

pub use error::WorkItemError;
pub use generate::{read_manifest, slugify, WorkItemGenerator, MANIFEST_FILE, WORKITEMS_DIR};
pub use types::{
    GenerationResult, ItemCounts, Level, Manifest, Priority, Status, TreeNode, ValidationIssue,
    ValidationResult, ValidationWarning, WorkItem,
};
pub use validate::WorkItemValidator;
pub use watch::{auto_generate_enabled, regenerate_if_enabled, WorkItemWatcher};
