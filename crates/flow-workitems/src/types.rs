// types.rs - Universal work-item model, manifest, and result types.
//
// One `WorkItem` shape serves all three levels; level-specific fields are
// optional and omitted from the YAML when unset. The generator only fills
// the fields that belong to each level.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version stamped into every generated document.
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Epic,
    Story,
    Task,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Epic, Level::Story, Level::Task];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Epic => "epic",
            Level::Story => "story",
            Level::Task => "task",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Backlog,
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Backlog,
        Status::Todo,
        Status::InProgress,
        Status::InReview,
        Status::Done,
        Status::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Backlog => "backlog",
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::InReview => "in_review",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
        }
    }

    /// Map a tier-artifact status onto the universal set. Unknown → backlog.
    pub fn from_source(status: Option<&str>) -> Self {
        match status.map(str::to_lowercase).as_deref() {
            Some("defined" | "ready" | "pending") => Status::Todo,
            Some("in_progress" | "in-progress") => Status::InProgress,
            Some("review" | "in_review") => Status::InReview,
            Some("done" | "complete" | "completed") => Status::Done,
            Some("cancelled" | "canceled") => Status::Cancelled,
            // draft, blocked, and anything unrecognised
            _ => Status::Backlog,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }

    /// Map a MoSCoW rating. Unknown → medium.
    pub fn from_moscow(moscow: Option<&str>) -> Self {
        match moscow.map(str::to_lowercase).as_deref() {
            Some("must") => Priority::High,
            Some("should") => Priority::Medium,
            Some("could") => Priority::Low,
            Some("wont") => Priority::None,
            _ => Priority::Medium,
        }
    }
}

/// Which kind of tier artifact an item was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    TierEpic,
    TierStory,
    TierTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub kind: SourceType,
    /// Path of the source artifact, relative to the initiative root.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemMeta {
    pub schema_version: String,
    pub level: Level,
    pub source: SourceRef,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateUnit {
    #[serde(rename = "points")]
    Points,
    #[serde(rename = "hours")]
    Hours,
    #[serde(rename = "days")]
    Days,
    #[serde(rename = "t-shirt")]
    TShirt,
}

/// A numeric estimate or a t-shirt size (`XS`..`XL`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EstimateValue {
    Whole(u64),
    Fractional(f64),
    Size(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: EstimateValue,
    pub unit: EstimateUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStory {
    pub as_a: String,
    pub i_want: String,
    pub so_that: String,
}

/// Free text or a given/when/then scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AcceptanceCriterion {
    Scenario {
        given: String,
        when: String,
        then: String,
    },
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub kind: DependencyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMetric {
    pub metric: String,
    #[serde(default)]
    pub target: String,
}

/// An epic, story, or task in the universal format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "_meta")]
    pub meta: WorkItemMeta,
    /// `<hierarchical-index>-<slug>`, e.g. `1.2-checkout-flow`.
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<Estimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,

    // Epic
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_metrics: Vec<SuccessMetric>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risks: Vec<Risk>,

    // Story
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_story: Option<UserStory>,

    // Task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_files: Vec<String>,
}

impl WorkItem {
    pub fn level(&self) -> Level {
        self.meta.level
    }
}

/// One node of the manifest tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub level: Level,
    pub status: Status,
    pub priority: Priority,
    /// Item file, relative to the `workitems/` directory.
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Adr,
    Prd,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedDocument {
    #[serde(rename = "type")]
    pub kind: DocumentType,
    pub id: String,
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedDocuments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd: Option<RelatedDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adrs: Vec<RelatedDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_items: usize,
    pub by_level: BTreeMap<Level, usize>,
    pub by_status: BTreeMap<Status, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
}

impl Summary {
    /// Counts over `items`, with every level, status, and priority present.
    pub fn of<'a>(items: impl IntoIterator<Item = &'a WorkItem>) -> Self {
        let mut summary = Summary {
            total_items: 0,
            by_level: Level::ALL.into_iter().map(|l| (l, 0)).collect(),
            by_status: Status::ALL.into_iter().map(|s| (s, 0)).collect(),
            by_priority: Priority::ALL.into_iter().map(|p| (p, 0)).collect(),
        };
        for item in items {
            summary.total_items += 1;
            *summary.by_level.entry(item.level()).or_default() += 1;
            *summary.by_status.entry(item.status).or_default() += 1;
            *summary.by_priority.entry(item.priority).or_default() += 1;
        }
        summary
    }

    pub fn count_status(&self, status: Status) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Contents of `workitems/manifest.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub project: ProjectInfo,
    pub tree: Vec<TreeNode>,
    #[serde(default)]
    pub related_documents: RelatedDocuments,
    pub summary: Summary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounts {
    pub epics: usize,
    pub stories: usize,
    pub tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    /// The `workitems/` directory.
    pub path: PathBuf,
    pub items_generated: ItemCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// A rule violation that makes the tree invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub rule: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Errors raised by `rule`.
    pub fn errors_for(&self, rule: &str) -> Vec<&ValidationIssue> {
        self.errors.iter().filter(|e| e.rule == rule).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            ("draft", Status::Backlog),
            ("Defined", Status::Todo),
            ("pending", Status::Todo),
            ("in-progress", Status::InProgress),
            ("review", Status::InReview),
            ("COMPLETED", Status::Done),
            ("canceled", Status::Cancelled),
            ("blocked", Status::Backlog),
            ("mystery", Status::Backlog),
        ];
        for (input, expected) in cases {
            assert_eq!(Status::from_source(Some(input)), expected, "{}", input);
        }
        assert_eq!(Status::from_source(None), Status::Backlog);
    }

    #[test]
    fn priority_mapping() {
        assert_eq!(Priority::from_moscow(Some("Must")), Priority::High);
        assert_eq!(Priority::from_moscow(Some("should")), Priority::Medium);
        assert_eq!(Priority::from_moscow(Some("could")), Priority::Low);
        assert_eq!(Priority::from_moscow(Some("wont")), Priority::None);
        assert_eq!(Priority::from_moscow(Some("maybe")), Priority::Medium);
        assert_eq!(Priority::from_moscow(None), Priority::Medium);
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(serde_yaml::to_string(&Status::InProgress).unwrap().trim(), "in_progress");
        assert_eq!(serde_yaml::to_string(&EstimateUnit::TShirt).unwrap().trim(), "t-shirt");
        assert_eq!(serde_yaml::to_string(&SourceType::TierStory).unwrap().trim(), "tier_story");
    }

    #[test]
    fn acceptance_criteria_accept_text_or_scenario() {
        let parsed: Vec<AcceptanceCriterion> = serde_yaml::from_str(
            r#"
- Cart total updates
- given: a cart
  when: an item is added
  then: total grows
"#,
        )
        .unwrap();
        assert!(matches!(parsed[0], AcceptanceCriterion::Text(_)));
        assert!(matches!(parsed[1], AcceptanceCriterion::Scenario { .. }));
    }

    #[test]
    fn estimate_value_prefers_integers() {
        let estimate: Estimate = serde_yaml::from_str("value: 5\nunit: points\n").unwrap();
        assert_eq!(estimate.value, EstimateValue::Whole(5));
        let estimate: Estimate = serde_yaml::from_str("value: M\nunit: t-shirt\n").unwrap();
        assert_eq!(estimate.value, EstimateValue::Size("M".into()));
    }
}
