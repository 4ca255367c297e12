// loader.rs - Locate, parse, and validate schema documents.
//
// Schemas live at `<schemas_dir>/<name>/schema.yaml`. Validation happens in
// two passes: a shape check on the raw YAML (so missing top-level fields get
// a clear message instead of a serde path), then typed deserialization,
// duplicate-id detection, and cycle detection over `requires`.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::SchemaError;
use crate::ids::{GateId, Tier};
use crate::order::topological_order;
use crate::schema::{
    ApplySection, ArchiveSection, ArtifactDefinition, GateCriterion, GateDefinition, Schema,
    TierDefinition,
};

/// File name of a schema document inside its schema directory.
pub const SCHEMA_FILE: &str = "schema.yaml";

/// Loads schemas from a directory of named schema folders.
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    schemas_dir: PathBuf,
}

impl SchemaLoader {
    pub fn new(schemas_dir: impl AsRef<Path>) -> Self {
        Self {
            schemas_dir: schemas_dir.as_ref().to_path_buf(),
        }
    }

    /// Path where the schema named `name` is expected.
    pub fn schema_path(&self, name: &str) -> PathBuf {
        self.schemas_dir.join(name).join(SCHEMA_FILE)
    }

    /// Load and validate the schema named `name`.
    pub fn load(&self, name: &str) -> Result<Schema, SchemaError> {
        let path = self.schema_path(name);
        let content = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SchemaError::NotFound {
                    name: name.to_string(),
                    path: path.display().to_string(),
                }
            } else {
                SchemaError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;
        let schema = parse_schema(&content, name)?;
        tracing::debug!(
            schema = %schema.name,
            artifacts = schema.artifacts.len(),
            gates = schema.gates.len(),
            "loaded schema"
        );
        Ok(schema)
    }
}

#[derive(Deserialize)]
struct RawSchema {
    name: String,
    version: serde_yaml::Number,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tiers: Vec<TierDefinition>,
    artifacts: Vec<ArtifactDefinition>,
    gates: BTreeMap<GateId, RawGate>,
    #[serde(default)]
    apply: Option<ApplySection>,
    #[serde(default)]
    archive: Option<ArchiveSection>,
}

#[derive(Deserialize)]
struct RawGate {
    #[serde(default)]
    description: String,
    #[serde(default)]
    from_artifacts: Vec<String>,
    #[serde(default)]
    to_tier: Option<Tier>,
    #[serde(default)]
    terminal: bool,
    #[serde(default)]
    criteria: Vec<GateCriterion>,
}

/// Parse and validate schema YAML. `name` is only used in error messages.
pub fn parse_schema(content: &str, name: &str) -> Result<Schema, SchemaError> {
    let raw: Value = serde_yaml::from_str(content).map_err(|source| SchemaError::Yaml {
        name: name.to_string(),
        source,
    })?;
    check_shape(&raw, name)?;

    let raw: RawSchema = serde_yaml::from_value(raw)
        .map_err(|e| SchemaError::validation(name, e.to_string()))?;

    let mut seen = HashSet::new();
    for artifact in &raw.artifacts {
        if !seen.insert(artifact.id.as_str()) {
            return Err(SchemaError::validation(
                name,
                format!("duplicate artifact id '{}'", artifact.id),
            ));
        }
    }

    let order = topological_order(&raw.artifacts).map_err(|cycle| {
        SchemaError::validation(
            name,
            format!("dependency cycle between artifacts: {}", cycle.join(" -> ")),
        )
    })?;

    let gates = raw
        .gates
        .into_iter()
        .map(|(id, g)| {
            (
                id,
                GateDefinition {
                    id,
                    description: g.description,
                    from_artifacts: g.from_artifacts,
                    to_tier: g.to_tier,
                    terminal: g.terminal,
                    criteria: g.criteria,
                },
            )
        })
        .collect();

    Ok(Schema {
        name: raw.name,
        version: raw.version,
        description: raw.description,
        tiers: raw.tiers,
        artifacts: raw.artifacts,
        gates,
        apply: raw.apply.unwrap_or_default(),
        archive: raw.archive.unwrap_or_default(),
        order,
    })
}

/// Check the required top-level fields before typed deserialization.
fn check_shape(raw: &Value, name: &str) -> Result<(), SchemaError> {
    let Value::Mapping(map) = raw else {
        return Err(SchemaError::validation(name, "document is not a mapping"));
    };

    match map.get("name") {
        Some(Value::String(s)) if !s.is_empty() => {}
        _ => return Err(SchemaError::validation(name, "missing 'name' field")),
    }
    match map.get("version") {
        Some(Value::Number(n)) if n.as_f64().is_some_and(|v| v != 0.0) => {}
        Some(Value::Number(_)) => {
            return Err(SchemaError::validation(name, "'version' must be non-zero"))
        }
        _ => return Err(SchemaError::validation(name, "missing 'version' field")),
    }
    let Some(Value::Sequence(artifacts)) = map.get("artifacts") else {
        return Err(SchemaError::validation(name, "missing 'artifacts' array"));
    };
    if !matches!(map.get("gates"), Some(Value::Mapping(_))) {
        return Err(SchemaError::validation(name, "missing 'gates' object"));
    }

    for (i, artifact) in artifacts.iter().enumerate() {
        let has = |key: &str| {
            matches!(artifact.get(key), Some(Value::String(s)) if !s.is_empty())
        };
        if !has("id") || !has("generates") {
            return Err(SchemaError::validation(
                name,
                format!("artifact {} missing required fields", i),
            ));
        }
    }

    Ok(())
}
