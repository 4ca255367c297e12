// config.rs - Path layout and project settings.
//
// FlowConfig resolves where everything lives under a project's `openspec/`
// directory. ProjectConfig is the user-editable `openspec/config.yaml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InitiativeError;

/// Schema used when `config.yaml` does not name one.
pub const DEFAULT_SCHEMA: &str = "initiative-flow";

/// Resolved filesystem layout for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Root directory of the project.
    pub project_root: PathBuf,

    /// Directory of named schema folders (`<name>/schema.yaml`).
    pub schemas_dir: PathBuf,

    /// One subdirectory per initiative.
    pub initiatives_dir: PathBuf,

    /// Project settings document.
    pub config_file: PathBuf,

    /// Append-only lifecycle event log (JSONL).
    pub events_log: PathBuf,

    /// Optional `_schema.yaml` / `README.md` copied into generated work items.
    pub workitem_templates_dir: PathBuf,
}

impl FlowConfig {
    /// Standard `openspec/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let openspec = root.join("openspec");
        Self {
            project_root: root,
            schemas_dir: openspec.join("schemas"),
            initiatives_dir: openspec.join("initiatives"),
            config_file: openspec.join("config.yaml"),
            events_log: openspec.join("events.jsonl"),
            workitem_templates_dir: openspec.join("schemas").join("workitems"),
        }
    }

    /// Root directory of one initiative's artifacts.
    pub fn initiative_dir(&self, initiative_id: &str) -> PathBuf {
        self.initiatives_dir.join(initiative_id)
    }
}

/// Work-item generation settings for one initiative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auto_generate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialized_at: Option<DateTime<Utc>>,
}

/// Contents of `openspec/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Keyed by initiative id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub workitems: BTreeMap<String, WorkItemsSettings>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            workitems: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, InitiativeError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| InitiativeError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        // An empty document deserializes to unit, not a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| InitiativeError::YamlError {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), InitiativeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| InitiativeError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|source| InitiativeError::YamlError {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(path, yaml).map_err(|source| InitiativeError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn workitems_for(&self, initiative_id: &str) -> WorkItemsSettings {
        self.workitems
            .get(initiative_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the work-item watcher should regenerate for this initiative.
    pub fn auto_generate_enabled(&self, initiative_id: &str) -> bool {
        let settings = self.workitems_for(initiative_id);
        settings.enabled && settings.auto_generate
    }

    /// Turn on generation and auto-regeneration for an initiative.
    pub fn enable_workitems(&mut self, initiative_id: &str) {
        self.workitems.insert(
            initiative_id.to_string(),
            WorkItemsSettings {
                enabled: true,
                auto_generate: true,
                initialized_at: Some(Utc::now()),
            },
        );
    }
}
