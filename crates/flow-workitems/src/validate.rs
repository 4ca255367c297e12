// validate.rs - WorkItemValidator: structural checks over a generated tree.
//
// Items are validated as raw YAML rather than `WorkItem` so that documents
// with out-of-range values (an unknown status, a missing level) are reported
// rule by rule instead of failing to parse.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use flow_initiative::FlowConfig;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::error::WorkItemError;
use crate::generate::{MANIFEST_FILE, SCHEMA_TEMPLATE, WORKITEMS_DIR};
use crate::types::{
    Level, Manifest, Priority, Status, ValidationIssue, ValidationResult, ValidationWarning,
};

const REQUIRED_FIELDS: [&str; 5] = ["id", "title", "description", "status", "created_at"];

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)*-.+$").expect("valid work item id regex"))
}

/// One item document, addressed by its path inside `workitems/`.
struct ItemDoc {
    path: String,
    fields: Mapping,
}

impl ItemDoc {
    fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    fn parent(&self) -> Option<&str> {
        self.str_field("parent").filter(|p| !p.is_empty())
    }

    /// Whether `parent` holds anything at all, id or not.
    fn has_parent(&self) -> bool {
        !is_missing(self.fields.get("parent"))
    }

    fn children(&self) -> Vec<&str> {
        match self.fields.get("children") {
            Some(Value::Sequence(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn level(&self) -> Option<Level> {
        let level = self.fields.get("_meta")?.get("level")?;
        serde_yaml::from_value(level.clone()).ok()
    }
}

/// What was found at `workitems/manifest.yaml`.
enum ManifestState {
    Missing,
    Malformed(String),
    Loaded,
}

/// The parts of an item other items refer to.
struct IndexEntry<'d> {
    level: Option<Level>,
    parent: Option<&'d str>,
    children: Vec<&'d str>,
}

/// Validates the generated work items of initiatives in a project.
pub struct WorkItemValidator {
    config: FlowConfig,
}

impl WorkItemValidator {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn validate(&self, initiative_id: &str) -> Result<ValidationResult, WorkItemError> {
        let root = self.config.initiative_dir(initiative_id).join(WORKITEMS_DIR);
        if !root.is_dir() {
            return Ok(ValidationResult {
                valid: false,
                errors: vec![ValidationIssue {
                    path: root.display().to_string(),
                    field: None,
                    rule: "workitems_exists".to_string(),
                    message: format!("{}/ not found", WORKITEMS_DIR),
                }],
                warnings: Vec::new(),
            });
        }

        let mut items = Vec::new();
        let mut manifest = ManifestState::Missing;
        collect_documents(&root, &root, &mut items, &mut manifest)?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        match manifest {
            ManifestState::Missing => errors.push(issue(
                MANIFEST_FILE,
                None,
                "manifest_exists",
                format!("{} not found", MANIFEST_FILE),
            )),
            ManifestState::Malformed(reason) => errors.push(issue(
                MANIFEST_FILE,
                None,
                "manifest_valid",
                format!("{} is malformed: {}", MANIFEST_FILE, reason),
            )),
            ManifestState::Loaded => {}
        }

        let index: HashMap<&str, IndexEntry<'_>> = items
            .iter()
            .filter_map(|doc| {
                doc.id().map(|id| {
                    (
                        id,
                        IndexEntry {
                            level: doc.level(),
                            parent: doc.parent(),
                            children: doc.children(),
                        },
                    )
                })
            })
            .collect();

        for doc in &items {
            validate_item(doc, &index, &mut errors);
        }

        let mut seen = HashSet::new();
        for doc in &items {
            if let Some(id) = doc.id() {
                if !seen.insert(id) {
                    errors.push(issue(
                        &doc.path,
                        Some("id"),
                        "unique_ids",
                        format!("Duplicate ID '{}'", id),
                    ));
                }
            }
        }

        if items.is_empty() {
            warnings.push(ValidationWarning {
                path: root.display().to_string(),
                field: None,
                message: "No work items found".to_string(),
            });
        }

        tracing::debug!(
            initiative = initiative_id,
            items = items.len(),
            errors = errors.len(),
            "work items validated"
        );
        Ok(ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        })
    }
}

/// Walk `dir`, loading item documents and the manifest. Malformed YAML is skipped.
fn collect_documents(
    root: &Path,
    dir: &Path,
    items: &mut Vec<ItemDoc>,
    manifest: &mut ManifestState,
) -> Result<(), WorkItemError> {
    let entries = fs::read_dir(dir).map_err(|source| WorkItemError::IoError {
        path: dir.display().to_string(),
        source,
    })?;
    let mut paths: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_documents(root, &path, items, manifest)?;
            continue;
        }
        if !path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name == SCHEMA_TEMPLATE {
            continue;
        }
        let content = fs::read_to_string(&path).map_err(|source| WorkItemError::IoError {
            path: path.display().to_string(),
            source,
        })?;

        if name == MANIFEST_FILE && path.parent() == Some(root) {
            *manifest = match serde_yaml::from_str::<Manifest>(&content) {
                Ok(_) => ManifestState::Loaded,
                Err(e) => ManifestState::Malformed(e.to_string()),
            };
            continue;
        }

        match serde_yaml::from_str::<Value>(&content) {
            Ok(Value::Mapping(fields)) => {
                let rel = path
                    .strip_prefix(root)
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|_| path.display().to_string());
                items.push(ItemDoc { path: rel, fields });
            }
            Ok(_) => tracing::debug!(path = %path.display(), "skipping non-mapping work item"),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping malformed work item")
            }
        }
    }
    Ok(())
}

fn issue(path: &str, field: Option<&str>, rule: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        field: field.map(str::to_string),
        rule: rule.to_string(),
        message,
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Bool(b)) => !b,
        _ => false,
    }
}

fn parses_as<T: serde::de::DeserializeOwned>(value: &Value) -> bool {
    serde_yaml::from_value::<T>(value.clone()).is_ok()
}

fn validate_item(
    doc: &ItemDoc,
    index: &HashMap<&str, IndexEntry<'_>>,
    errors: &mut Vec<ValidationIssue>,
) {
    let path = doc.path.as_str();

    for field in REQUIRED_FIELDS {
        if is_missing(doc.fields.get(field)) {
            errors.push(issue(
                path,
                Some(field),
                "required_fields_present",
                format!("Required field '{}' missing", field),
            ));
        }
    }

    if let Some(id) = doc.fields.get("id").filter(|v| !is_missing(Some(*v))) {
        if !id.as_str().is_some_and(|id| id_regex().is_match(id)) {
            errors.push(issue(
                path,
                Some("id"),
                "valid_id_format",
                "Invalid ID format, expected <index>-<slug> such as 1.2-checkout".to_string(),
            ));
        }
    }

    if let Some(status) = doc.fields.get("status").filter(|v| !is_missing(Some(*v))) {
        if !parses_as::<Status>(status) {
            errors.push(issue(
                path,
                Some("status"),
                "valid_status_value",
                format!("Invalid status {:?}", status),
            ));
        }
    }

    if let Some(priority) = doc.fields.get("priority").filter(|v| !is_missing(Some(*v))) {
        if !parses_as::<Priority>(priority) {
            errors.push(issue(
                path,
                Some("priority"),
                "valid_priority_value",
                format!("Invalid priority {:?}", priority),
            ));
        }
    }

    let level = doc.level();
    if level.is_none() {
        errors.push(issue(
            path,
            Some("_meta.level"),
            "valid_level",
            "Invalid level".to_string(),
        ));
    }

    let id = doc.id().unwrap_or_default();
    let parent = doc.parent();
    let children = doc.children();

    if doc.has_parent() && parent.is_none() {
        errors.push(issue(
            path,
            Some("parent"),
            "parent_exists",
            format!("Parent {:?} is not an item id", doc.fields.get("parent")),
        ));
    }
    if let Some(parent) = parent {
        match index.get(parent) {
            None => errors.push(issue(
                path,
                Some("parent"),
                "parent_exists",
                format!("Parent '{}' not found", parent),
            )),
            Some(entry) if !entry.children.contains(&id) => errors.push(issue(
                path,
                Some("parent"),
                "bidirectional_relationships",
                format!("Parent '{}' doesn't list this item as a child", parent),
            )),
            Some(_) => {}
        }
    }

    for child in &children {
        match index.get(child) {
            None => errors.push(issue(
                path,
                Some("children"),
                "children_exist",
                format!("Child '{}' not found", child),
            )),
            Some(entry) if entry.parent != Some(id) => errors.push(issue(
                path,
                Some("children"),
                "bidirectional_relationships",
                format!("Child '{}' doesn't list this item as its parent", child),
            )),
            Some(_) => {}
        }
    }

    match level {
        Some(Level::Epic) if doc.has_parent() => errors.push(issue(
            path,
            Some("parent"),
            "epics_have_no_parent",
            "Epics cannot have a parent".to_string(),
        )),
        Some(Level::Task) if !children.is_empty() => errors.push(issue(
            path,
            Some("children"),
            "tasks_are_leaves",
            "Tasks cannot have children".to_string(),
        )),
        _ => {}
    }

    let expected_parent = match level {
        Some(Level::Story) => Some(Level::Epic),
        Some(Level::Task) => Some(Level::Story),
        _ => None,
    };
    if let (Some(expected), Some(parent)) = (expected_parent, parent) {
        if let Some(entry) = index.get(parent) {
            if entry.level != Some(expected) {
                errors.push(issue(
                    path,
                    Some("parent"),
                    "level_hierarchy",
                    format!("{} parent must be {}", capitalize(level), expected),
                ));
            }
        }
    }
}

fn capitalize(level: Option<Level>) -> &'static str {
    match level {
        Some(Level::Epic) => "Epic",
        Some(Level::Story) => "Story",
        Some(Level::Task) => "Task",
        None => "Item",
    }
}
