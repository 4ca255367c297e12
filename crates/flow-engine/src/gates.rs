// gates.rs - GateChecker: evaluate gate criteria against artifact files.
//
// A gate passes when every declared criterion passes and the initiative has
// no open escalations. The escalation rule is not declared in the schema; it
// applies to every gate.

use flow_initiative::{InitiativeError, InitiativeStore};
use flow_schema::{CriterionCheck, GateCriterion, GateId, Schema};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::document::{is_empty_value, ArtifactTree};
use crate::error::EngineError;

/// Outcome of one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCriterionResult {
    /// Criterion label: its id, else its description, else the check kind.
    pub criterion: String,
    pub check: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// Number of files matched (`glob_min_count`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<usize>,
    /// Number of files inspected (`all_have_field*`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl GateCriterionResult {
    fn new(check: &str, passed: bool) -> Self {
        Self {
            criterion: check.to_string(),
            check: check.to_string(),
            passed,
            reason: None,
            expected: None,
            actual: None,
            found: None,
            checked: None,
            missing: None,
        }
    }

    fn failing(criterion: &str, check: &str, reason: String) -> Self {
        Self {
            criterion: criterion.to_string(),
            reason: Some(reason),
            ..Self::new(check, false)
        }
    }
}

/// Outcome of a whole gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheckResult {
    pub gate: GateId,
    pub passed: bool,
    pub criteria: Vec<GateCriterionResult>,
    pub criteria_met: usize,
    pub criteria_total: usize,
    pub failing_criteria: Vec<GateCriterionResult>,
}

impl GateCheckResult {
    /// Labels of the failing criteria, in evaluation order.
    pub fn failing_labels(&self) -> Vec<&str> {
        self.failing_criteria
            .iter()
            .map(|c| c.criterion.as_str())
            .collect()
    }
}

/// Evaluates gate criteria for initiatives in a store.
pub struct GateChecker<'a> {
    schema: &'a Schema,
    store: &'a InitiativeStore,
}

impl<'a> GateChecker<'a> {
    pub fn new(schema: &'a Schema, store: &'a InitiativeStore) -> Self {
        Self { schema, store }
    }

    /// Evaluate a single criterion. The result is labelled with the check kind.
    pub fn check_criterion(
        &self,
        initiative_id: &str,
        criterion: &GateCriterion,
    ) -> Result<GateCriterionResult, EngineError> {
        let tree = ArtifactTree::new(self.store.initiative_dir(initiative_id));
        let kind = criterion.check.kind();

        let result = match &criterion.check {
            CriterionCheck::FileExists { path } => {
                if tree.is_readable(path) {
                    GateCriterionResult::new(kind, true)
                } else {
                    GateCriterionResult::failing(kind, kind, format!("File not found: {}", path))
                }
            }

            CriterionCheck::GlobMinCount { pattern, min } => {
                let found = tree.glob(pattern)?.len();
                let passed = found >= *min;
                GateCriterionResult {
                    found: Some(found),
                    expected: Some(Value::from(*min as u64)),
                    reason: (!passed)
                        .then(|| format!("Found {} files, need at least {}", found, min)),
                    ..GateCriterionResult::new(kind, passed)
                }
            }

            CriterionCheck::FieldValue {
                path,
                field,
                expected,
            } => {
                let fields = tree.fields(path);
                let actual = fields.get(field).cloned().unwrap_or(Value::Null);
                let passed = actual == *expected;
                GateCriterionResult {
                    reason: (!passed).then(|| {
                        format!(
                            "Field '{}' is {}, expected {}",
                            field,
                            render(&actual),
                            render(expected)
                        )
                    }),
                    expected: Some(expected.clone()),
                    actual: Some(actual),
                    ..GateCriterionResult::new(kind, passed)
                }
            }

            CriterionCheck::FieldNotEmpty { path, field } => {
                let fields = tree.fields(path);
                let value = fields.get(field);
                let passed = !is_empty_value(value);
                GateCriterionResult {
                    actual: value.cloned(),
                    reason: (!passed).then(|| format!("Field '{}' is empty or null", field)),
                    ..GateCriterionResult::new(kind, passed)
                }
            }

            CriterionCheck::AllHaveField { pattern, field } => {
                self.all_have_field(&tree, kind, pattern, field, None)?
            }

            CriterionCheck::AllHaveFieldValue {
                pattern,
                field,
                expected,
            } => self.all_have_field(&tree, kind, pattern, field, expected.as_ref())?,
        };

        Ok(result)
    }

    /// Every file matching `pattern` must carry `field` (non-null, and equal
    /// to `expected` when one is given). Zero matches fail the criterion.
    fn all_have_field(
        &self,
        tree: &ArtifactTree,
        kind: &str,
        pattern: &str,
        field: &str,
        expected: Option<&Value>,
    ) -> Result<GateCriterionResult, EngineError> {
        let files = tree.glob(pattern)?;
        if files.is_empty() {
            return Ok(GateCriterionResult {
                checked: Some(0),
                ..GateCriterionResult::failing(
                    kind,
                    kind,
                    format!("No files found matching pattern: {}", pattern),
                )
            });
        }

        let missing: Vec<String> = files
            .iter()
            .filter(|file| {
                let fields = tree.fields(file);
                match (fields.get(field), expected) {
                    (None | Some(Value::Null), _) => true,
                    (Some(actual), Some(expected)) => actual != expected,
                    (Some(_), None) => false,
                }
            })
            .cloned()
            .collect();

        let passed = missing.is_empty();
        let reason = (!passed).then(|| match expected {
            Some(expected) => format!(
                "Files without '{}' = {}: {}",
                field,
                render(expected),
                missing.join(", ")
            ),
            None => format!("Files missing '{}': {}", field, missing.join(", ")),
        });
        Ok(GateCriterionResult {
            checked: Some(files.len()),
            expected: expected.cloned(),
            missing: (!passed).then_some(missing),
            reason,
            ..GateCriterionResult::new(kind, passed)
        })
    }

    /// Evaluate every criterion of `gate`, then the open-escalation rule.
    pub fn check_gate(
        &self,
        initiative_id: &str,
        gate: GateId,
    ) -> Result<GateCheckResult, EngineError> {
        let definition = self
            .schema
            .gate(gate)
            .ok_or(EngineError::GateNotFound(gate))?;

        let mut criteria = Vec::with_capacity(definition.criteria.len() + 1);
        for criterion in &definition.criteria {
            let mut result = self.check_criterion(initiative_id, criterion)?;
            result.criterion = criterion.label();
            criteria.push(result);
        }

        if let Some(result) = self.check_escalations(initiative_id) {
            criteria.push(result);
        }

        let failing_criteria: Vec<GateCriterionResult> =
            criteria.iter().filter(|c| !c.passed).cloned().collect();
        let criteria_met = criteria.len() - failing_criteria.len();

        tracing::debug!(
            initiative = initiative_id,
            gate = %gate,
            met = criteria_met,
            total = criteria.len(),
            "checked gate"
        );

        Ok(GateCheckResult {
            gate,
            passed: failing_criteria.is_empty(),
            criteria_met,
            criteria_total: criteria.len(),
            criteria,
            failing_criteria,
        })
    }

    /// `(can_pass, result)` for a gate.
    pub fn can_pass_gate(
        &self,
        initiative_id: &str,
        gate: GateId,
    ) -> Result<(bool, GateCheckResult), EngineError> {
        let result = self.check_gate(initiative_id, gate)?;
        Ok((result.passed, result))
    }

    /// A failing criterion when escalations are open or the state file is
    /// unusable. An absent state file skips the check.
    fn check_escalations(&self, initiative_id: &str) -> Option<GateCriterionResult> {
        match self.store.load(initiative_id) {
            Ok(state) => {
                let open = state.open_escalations().count();
                (open > 0).then(|| {
                    GateCriterionResult::failing(
                        "no_unresolved_escalations",
                        "escalations",
                        format!("{} unresolved escalation(s)", open),
                    )
                })
            }
            Err(InitiativeError::NotFound(_)) => {
                tracing::warn!(
                    initiative = initiative_id,
                    "no state file; skipping escalation check"
                );
                None
            }
            Err(e) => Some(GateCriterionResult::failing(
                "state_readable",
                "escalations",
                format!("Cannot read initiative state: {}", e),
            )),
        }
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flow_initiative::{Escalation, Severity};
    use flow_schema::{parse_schema, Tier};
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    const SCHEMA: &str = r#"
name: test-flow
version: 1
artifacts:
  - { id: strategic-mandate, tier: tier1, generates: tier1/strategic-mandate.md }
  - { id: epics, tier: tier2, generates: "tier2/epics/*.yaml" }
gates:
  strategic:
    criteria:
      - id: mandate_exists
        check: file_exists
        path: tier1/strategic-mandate.md
      - id: vision_aligned
        check: field_value
        path: tier1/strategic-mandate.md
        field: vision_aligned
        expected: true
      - id: sponsor_identified
        check: field_not_empty
        path: tier1/strategic-mandate.md
        field: sponsor
      - id: success_metrics_defined
        check: field_not_empty
        path: tier1/strategic-mandate.md
        field: success_metrics
  product:
    criteria:
      - id: epics_defined
        check: glob_min_count
        pattern: "tier2/epics/*.yaml"
        min: 2
      - id: moscow_applied
        check: all_have_field
        pattern: "tier2/epics/*.yaml"
        field: moscow
      - description: All epics approved
        check: all_have_field_value
        pattern: "tier2/epics/*.yaml"
        field: approved
        expected: true
"#;

    struct Fixture {
        _dir: TempDir,
        store: InitiativeStore,
        schema: Schema,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let store = InitiativeStore::new(dir.path());
            store.create("init", "Init").unwrap();
            Self {
                _dir: dir,
                store,
                schema: parse_schema(SCHEMA, "test-flow").unwrap(),
            }
        }

        fn root(&self) -> std::path::PathBuf {
            self.store.initiative_dir("init")
        }

        fn write(&self, rel: &str, content: &str) {
            write(&self.root(), rel, content);
        }

        fn checker(&self) -> GateChecker<'_> {
            GateChecker::new(&self.schema, &self.store)
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const MANDATE: &str =
        "---\nvision_aligned: true\nsponsor: Jane\nsuccess_metrics:\n  - KPI1\n---\n# Mandate\n";

    #[test]
    fn strategic_gate_passes_with_complete_mandate() {
        let fx = Fixture::new();
        fx.write("tier1/strategic-mandate.md", MANDATE);

        let result = fx.checker().check_gate("init", GateId::Strategic).unwrap();
        assert!(result.passed, "{:?}", result.failing_criteria);
        assert_eq!(result.criteria_met, 4);
        assert_eq!(result.criteria_total, 4);
    }

    #[test]
    fn null_sponsor_fails_sponsor_criterion() {
        let fx = Fixture::new();
        fx.write(
            "tier1/strategic-mandate.md",
            "---\nvision_aligned: true\nsponsor: null\nsuccess_metrics: [KPI1]\n---\n",
        );

        let result = fx.checker().check_gate("init", GateId::Strategic).unwrap();
        assert!(!result.passed);
        assert_eq!(result.failing_labels(), vec!["sponsor_identified"]);
        assert_eq!(
            result.failing_criteria[0].reason.as_deref(),
            Some("Field 'sponsor' is empty or null")
        );
        assert_eq!(result.failing_criteria[0].check, "field_not_empty");
    }

    #[test]
    fn missing_mandate_fails_every_criterion() {
        let fx = Fixture::new();
        let result = fx.checker().check_gate("init", GateId::Strategic).unwrap();
        assert_eq!(result.criteria_met, 0);
        assert_eq!(
            result.failing_criteria[0].reason.as_deref(),
            Some("File not found: tier1/strategic-mandate.md")
        );
        assert_eq!(result.failing_criteria[1].actual, Some(Value::Null));
    }

    #[test]
    fn field_value_uses_strict_equality() {
        let fx = Fixture::new();
        fx.write(
            "tier1/strategic-mandate.md",
            "---\nvision_aligned: \"true\"\nsponsor: Jane\nsuccess_metrics: [KPI1]\n---\n",
        );
        let result = fx.checker().check_gate("init", GateId::Strategic).unwrap();
        assert_eq!(result.failing_labels(), vec!["vision_aligned"]);
        assert_eq!(
            result.failing_criteria[0].reason.as_deref(),
            Some("Field 'vision_aligned' is \"true\", expected true")
        );
    }

    #[test]
    fn open_escalation_fails_an_otherwise_passing_gate() {
        let fx = Fixture::new();
        fx.write("tier1/strategic-mandate.md", MANDATE);
        let mut state = fx.store.load("init").unwrap();
        state.escalations.push(Escalation {
            id: "ESC-1".into(),
            from_tier: Tier::Tier2,
            to_tier: Tier::Tier1,
            severity: Severity::Medium,
            reason: "unclear vision".into(),
            created_at: Utc::now(),
            resolved_at: None,
            resolution: None,
        });
        fx.store.save(&state).unwrap();

        let (can_pass, result) = fx.checker().can_pass_gate("init", GateId::Strategic).unwrap();
        assert!(!can_pass);
        assert_eq!(result.criteria_total, 5);
        let escalation = &result.failing_criteria[0];
        assert_eq!(escalation.criterion, "no_unresolved_escalations");
        assert_eq!(escalation.check, "escalations");
        assert_eq!(escalation.reason.as_deref(), Some("1 unresolved escalation(s)"));

        // Resolving it lets the gate pass.
        state.escalations[0].resolved_at = Some(Utc::now());
        fx.store.save(&state).unwrap();
        assert!(fx.checker().check_gate("init", GateId::Strategic).unwrap().passed);
    }

    #[test]
    fn corrupt_state_blocks_the_gate() {
        let fx = Fixture::new();
        fx.write("tier1/strategic-mandate.md", MANDATE);
        fs::write(fx.store.state_path("init"), "metadata: [broken\n").unwrap();

        let result = fx.checker().check_gate("init", GateId::Strategic).unwrap();
        assert_eq!(result.failing_labels(), vec!["state_readable"]);
    }

    #[test]
    fn absent_state_skips_escalation_check() {
        let fx = Fixture::new();
        fx.write("tier1/strategic-mandate.md", MANDATE);
        fs::remove_file(fx.store.state_path("init")).unwrap();

        let result = fx.checker().check_gate("init", GateId::Strategic).unwrap();
        assert!(result.passed);
        assert_eq!(result.criteria_total, 4);
    }

    #[test]
    fn glob_min_count_reports_found() {
        let fx = Fixture::new();
        fx.write("tier2/epics/EP-001.yaml", "id: EP-001\nmoscow: must\napproved: true\n");

        let result = fx.checker().check_gate("init", GateId::Product).unwrap();
        let count = &result.criteria[0];
        assert!(!count.passed);
        assert_eq!(count.found, Some(1));
        assert_eq!(count.expected, Some(Value::from(2u64)));
        assert_eq!(count.reason.as_deref(), Some("Found 1 files, need at least 2"));
    }

    #[test]
    fn all_have_field_fails_on_zero_matches() {
        let fx = Fixture::new();
        let result = fx.checker().check_gate("init", GateId::Product).unwrap();
        let moscow = &result.criteria[1];
        assert_eq!(moscow.criterion, "moscow_applied");
        assert!(!moscow.passed);
        assert_eq!(moscow.checked, Some(0));
        assert_eq!(
            moscow.reason.as_deref(),
            Some("No files found matching pattern: tier2/epics/*.yaml")
        );
    }

    #[test]
    fn all_have_field_lists_files_missing_the_field() {
        let fx = Fixture::new();
        fx.write("tier2/epics/EP-001.yaml", "id: EP-001\nmoscow: must\napproved: true\n");
        fx.write("tier2/epics/EP-002.yaml", "id: EP-002\nmoscow: null\napproved: true\n");

        let result = fx.checker().check_gate("init", GateId::Product).unwrap();
        let moscow = &result.criteria[1];
        assert_eq!(moscow.checked, Some(2));
        assert_eq!(moscow.missing, Some(vec!["tier2/epics/EP-002.yaml".to_string()]));
        assert_eq!(
            moscow.reason.as_deref(),
            Some("Files missing 'moscow': tier2/epics/EP-002.yaml")
        );
    }

    #[test]
    fn all_have_field_value_compares_the_value() {
        let fx = Fixture::new();
        fx.write("tier2/epics/EP-001.yaml", "id: EP-001\nmoscow: must\napproved: true\n");
        fx.write("tier2/epics/EP-002.yaml", "id: EP-002\nmoscow: could\napproved: false\n");

        let result = fx.checker().check_gate("init", GateId::Product).unwrap();
        let approved = &result.criteria[2];
        assert_eq!(approved.criterion, "All epics approved");
        assert_eq!(approved.check, "all_have_field_value");
        assert!(!approved.passed);
        assert_eq!(approved.missing, Some(vec!["tier2/epics/EP-002.yaml".to_string()]));

        fx.write("tier2/epics/EP-002.yaml", "id: EP-002\nmoscow: could\napproved: true\n");
        let result = fx.checker().check_gate("init", GateId::Product).unwrap();
        assert!(result.passed, "{:?}", result.failing_criteria);
    }

    #[test]
    fn all_have_field_value_without_expected_checks_presence() {
        let fx = Fixture::new();
        fx.write("tier2/epics/EP-001.yaml", "owner: team-a\n");
        let criterion: GateCriterion = serde_yaml::from_str(
            "check: all_have_field_value\npattern: \"tier2/epics/*.yaml\"\nfield: owner\n",
        )
        .unwrap();
        let result = fx.checker().check_criterion("init", &criterion).unwrap();
        assert!(result.passed);
        assert_eq!(result.criterion, "all_have_field_value");
    }

    #[test]
    fn all_have_field_value_reads_markdown_frontmatter() {
        let fx = Fixture::new();
        fx.write("tier4/reviews/REV-001.md", "---\nstatus: approved\n---\n# Review\n");
        fx.write("tier4/reviews/REV-002.md", "---\nstatus: changes_requested\n---\n");
        let criterion: GateCriterion = serde_yaml::from_str(
            r#"
id: reviews_approved
check: all_have_field_value
pattern: "tier4/reviews/*.md"
field: status
expected: approved
"#,
        )
        .unwrap();

        let result = fx.checker().check_criterion("init", &criterion).unwrap();
        assert!(!result.passed);
        assert_eq!(result.checked, Some(2));
        assert_eq!(result.missing, Some(vec!["tier4/reviews/REV-002.md".to_string()]));

        fx.write("tier4/reviews/REV-002.md", "---\nstatus: approved\n---\n");
        let result = fx.checker().check_criterion("init", &criterion).unwrap();
        assert!(result.passed, "{:?}", result.reason);
    }

    #[test]
    fn unknown_gate_is_an_error() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.checker().check_gate("init", GateId::Design),
            Err(EngineError::GateNotFound(GateId::Design))
        ));
    }
}
