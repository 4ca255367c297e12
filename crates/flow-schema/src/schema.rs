// schema.rs - Typed workflow schema and its lookup views.
//
// The schema is the single description of the planning workflow: which
// artifacts exist, which tier owns them, which files they produce, what they
// depend on, and which gates guard tier exits. Everything else (status,
// gates, transitions) is computed against it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{GateId, Tier};

/// Definition of one planning tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierDefinition {
    pub id: Tier,
    #[serde(default)]
    pub name: String,
    /// The council responsible for approving this tier.
    #[serde(default)]
    pub council: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<String>,
    #[serde(default)]
    pub skills: TierSkills,
}

/// Skills attached to a tier: either a flat list or grouped by role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TierSkills {
    List(Vec<String>),
    Grouped(BTreeMap<String, Vec<String>>),
}

impl Default for TierSkills {
    fn default() -> Self {
        TierSkills::List(Vec::new())
    }
}

/// A document (or set of documents) an initiative must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDefinition {
    /// Unique within the schema (e.g., "strategic-mandate").
    pub id: String,
    pub tier: Tier,
    /// Path relative to the initiative root; may be a glob (e.g., "tier2/epics/*.yaml").
    pub generates: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruction: String,
    /// Artifact ids that must be done before this one becomes ready.
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateId>,
}

impl ArtifactDefinition {
    /// Whether `generates` names a set of files rather than a single file.
    pub fn is_multi_file(&self) -> bool {
        self.generates.contains('*')
    }
}

/// A single machine-checkable gate predicate.
///
/// `id` and `description` are optional labels used when reporting; the
/// predicate itself lives in [`CriterionCheck`], tagged by the `check` key:
///
/// ```yaml
/// - id: sponsor_identified
///   check: field_not_empty
///   path: tier1/strategic-mandate.md
///   field: sponsor
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCriterion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub check: CriterionCheck,
}

impl GateCriterion {
    /// Label used in gate reports: id, then description, then the check kind.
    pub fn label(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_else(|| self.check.kind().to_string())
    }
}

/// The predicate kinds a gate criterion can use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CriterionCheck {
    /// The file at `path` is readable.
    FileExists { path: String },

    /// At least `min` files match `pattern`.
    GlobMinCount {
        pattern: String,
        #[serde(default = "default_min")]
        min: usize,
    },

    /// `field` in the document at `path` equals `expected`.
    FieldValue {
        path: String,
        field: String,
        #[serde(default)]
        expected: serde_yaml::Value,
    },

    /// `field` in the document at `path` is present and non-empty.
    FieldNotEmpty { path: String, field: String },

    /// Every file matching `pattern` carries a non-null `field`.
    AllHaveField { pattern: String, field: String },

    /// Every file matching `pattern` carries `field` equal to `expected`.
    AllHaveFieldValue {
        pattern: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected: Option<serde_yaml::Value>,
    },
}

fn default_min() -> usize {
    1
}

impl CriterionCheck {
    /// The `check` tag as written in the schema.
    pub fn kind(&self) -> &'static str {
        match self {
            CriterionCheck::FileExists { .. } => "file_exists",
            CriterionCheck::GlobMinCount { .. } => "glob_min_count",
            CriterionCheck::FieldValue { .. } => "field_value",
            CriterionCheck::FieldNotEmpty { .. } => "field_not_empty",
            CriterionCheck::AllHaveField { .. } => "all_have_field",
            CriterionCheck::AllHaveFieldValue { .. } => "all_have_field_value",
        }
    }
}

/// A named bundle of criteria that must pass before leaving a tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDefinition {
    pub id: GateId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub from_artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_tier: Option<Tier>,
    /// The final gate of the workflow (no tier follows it).
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub criteria: Vec<GateCriterion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplySection {
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub tracks: String,
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSection {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub update_specs: bool,
}

/// A loaded, validated workflow schema.
///
/// Construct with [`crate::SchemaLoader::load`] or [`crate::parse_schema`];
/// both guarantee unique artifact ids and an acyclic `requires` graph.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub name: String,
    pub version: serde_yaml::Number,
    pub description: String,
    pub tiers: Vec<TierDefinition>,
    pub artifacts: Vec<ArtifactDefinition>,
    pub gates: BTreeMap<GateId, GateDefinition>,
    pub apply: ApplySection,
    pub archive: ArchiveSection,
    #[serde(skip)]
    pub(crate) order: Vec<String>,
}

impl Schema {
    /// Look up an artifact definition by id.
    pub fn artifact(&self, artifact_id: &str) -> Option<&ArtifactDefinition> {
        self.artifacts.iter().find(|a| a.id == artifact_id)
    }

    /// All artifacts owned by `tier`, in schema order.
    pub fn tier_artifacts(&self, tier: Tier) -> Vec<&ArtifactDefinition> {
        self.artifacts.iter().filter(|a| a.tier == tier).collect()
    }

    pub fn tier(&self, tier: Tier) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.id == tier)
    }

    pub fn gate(&self, gate: GateId) -> Option<&GateDefinition> {
        self.gates.get(&gate)
    }

    /// Artifacts that list `artifact_id` in their `requires`.
    pub fn dependents(&self, artifact_id: &str) -> Vec<&ArtifactDefinition> {
        self.artifacts
            .iter()
            .filter(|a| a.requires.iter().any(|r| r == artifact_id))
            .collect()
    }

    /// Artifact ids ordered so that every artifact follows its dependencies.
    pub fn artifact_order(&self) -> &[String] {
        &self.order
    }

    pub fn tier_order(&self) -> [Tier; 4] {
        Tier::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criterion_deserializes_from_check_tag() {
        let yaml = r#"
id: sponsor_identified
check: field_not_empty
path: tier1/strategic-mandate.md
field: sponsor
"#;
        let criterion: GateCriterion = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(criterion.label(), "sponsor_identified");
        assert_eq!(
            criterion.check,
            CriterionCheck::FieldNotEmpty {
                path: "tier1/strategic-mandate.md".into(),
                field: "sponsor".into(),
            }
        );
    }

    #[test]
    fn glob_min_count_defaults_to_one() {
        let criterion: GateCriterion =
            serde_yaml::from_str("check: glob_min_count\npattern: tier2/epics/*.yaml\n").unwrap();
        assert!(matches!(
            criterion.check,
            CriterionCheck::GlobMinCount { min: 1, .. }
        ));
    }

    #[test]
    fn label_falls_back_to_description_then_kind() {
        let described: GateCriterion = serde_yaml::from_str(
            "description: PRD exists\ncheck: file_exists\npath: tier2/prd.md\n",
        )
        .unwrap();
        assert_eq!(described.label(), "PRD exists");

        let bare: GateCriterion =
            serde_yaml::from_str("check: file_exists\npath: tier2/prd.md\n").unwrap();
        assert_eq!(bare.label(), "file_exists");
    }

    #[test]
    fn unknown_check_kind_is_rejected() {
        let result: Result<GateCriterion, _> =
            serde_yaml::from_str("check: vibes_ok\npath: x.md\n");
        assert!(result.is_err());
    }

    #[test]
    fn tier_skills_accepts_list_or_groups() {
        let list: TierSkills = serde_yaml::from_str("[a, b]").unwrap();
        assert!(matches!(list, TierSkills::List(ref v) if v.len() == 2));
        let grouped: TierSkills = serde_yaml::from_str("lead: [a]\nreview: [b, c]").unwrap();
        assert!(matches!(grouped, TierSkills::Grouped(ref m) if m.len() == 2));
    }
}
