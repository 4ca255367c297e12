// transition.rs - TransitionEngine: validate and apply stage transitions.
//
// A transition is valid when it is in the stage table and, for destinations
// that require a gate, the gate passes. Applying re-validates under the
// initiative's exclusive lock and also requires the persisted stage to equal
// the caller's `from`, so of two racing transitions from the same stage
// exactly one succeeds. Failed attempts never touch the state file.

use flow_initiative::{EventDispatcher, FlowEvent, InitiativeStore, Stage};
use flow_schema::Schema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::gates::{GateCheckResult, GateChecker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_check: Option<GateCheckResult>,
}

impl TransitionValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
            gate_check: None,
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            gate_check: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub success: bool,
    pub previous_stage: Stage,
    pub new_stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransitionResult {
    fn failed(previous: Stage, error: String) -> Self {
        Self {
            success: false,
            previous_stage: previous,
            new_stage: previous,
            error: Some(error),
        }
    }
}

/// Validates and applies stage transitions for initiatives in a store.
///
/// Without a schema, gate requirements are not enforced.
pub struct TransitionEngine<'a> {
    store: &'a InitiativeStore,
    schema: Option<&'a Schema>,
    dispatcher: EventDispatcher,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(store: &'a InitiativeStore) -> Self {
        Self {
            store,
            schema: None,
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Enforce gate requirements using `schema`.
    pub fn with_schema(mut self, schema: &'a Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Send `stage_changed` events to `dispatcher` after each applied transition.
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn current_stage(&self, initiative_id: &str) -> Result<Stage, EngineError> {
        Ok(self.store.load(initiative_id)?.stage)
    }

    /// Check the stage table and, when the destination requires one, the gate.
    pub fn can_transition(
        &self,
        initiative_id: &str,
        from: Stage,
        to: Stage,
    ) -> Result<TransitionValidation, EngineError> {
        if !from.can_transition_to(to) {
            let valid: Vec<&str> = from.valid_transitions().iter().map(|s| s.as_str()).collect();
            return Ok(TransitionValidation::rejected(format!(
                "Invalid transition: {} -> {}. Valid transitions: {}",
                from,
                to,
                if valid.is_empty() {
                    "none".to_string()
                } else {
                    valid.join(", ")
                }
            )));
        }

        let Some(gate) = to.required_gate() else {
            return Ok(TransitionValidation::ok());
        };
        let Some(schema) = self.schema else {
            tracing::warn!(
                initiative = initiative_id,
                gate = %gate,
                to = %to,
                "no schema loaded; gate requirement not enforced"
            );
            return Ok(TransitionValidation::ok());
        };

        let result = GateChecker::new(schema, self.store).check_gate(initiative_id, gate)?;
        if result.passed {
            return Ok(TransitionValidation::ok());
        }
        Ok(TransitionValidation {
            valid: false,
            reason: Some(format!(
                "Gate criteria not met for '{}': {}",
                gate,
                result.failing_labels().join(", ")
            )),
            gate_check: Some(result),
        })
    }

    pub fn apply_transition(
        &self,
        initiative_id: &str,
        from: Stage,
        to: Stage,
    ) -> Result<TransitionResult, EngineError> {
        self.apply_transition_as(initiative_id, from, to, None)
    }

    /// Apply a transition, recording `actor` in the history entry.
    pub fn apply_transition_as(
        &self,
        initiative_id: &str,
        from: Stage,
        to: Stage,
        actor: Option<&str>,
    ) -> Result<TransitionResult, EngineError> {
        // Surface a missing initiative as an error before creating its lock file.
        if !self.store.exists(initiative_id) {
            return Err(
                flow_initiative::InitiativeError::NotFound(initiative_id.to_string()).into(),
            );
        }
        let _lock = self.store.lock(initiative_id)?;

        let validation = self.can_transition(initiative_id, from, to)?;
        if !validation.valid {
            let reason = validation.reason.unwrap_or_default();
            tracing::debug!(initiative = initiative_id, %from, %to, %reason, "transition rejected");
            return Ok(TransitionResult::failed(from, reason));
        }

        let mut state = self.store.load(initiative_id)?;
        if state.stage != from {
            return Ok(TransitionResult::failed(
                state.stage,
                format!("Current stage is {}, expected {}", state.stage, from),
            ));
        }

        state.record_transition(to, actor.map(str::to_string));
        self.store.save(&state)?;
        tracing::info!(initiative = initiative_id, %from, %to, "stage transition applied");

        self.dispatcher
            .dispatch(&FlowEvent::stage_changed(initiative_id, from, to, actor));

        Ok(TransitionResult {
            success: true,
            previous_stage: from,
            new_stage: to,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_schema::{parse_schema, GateId};
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::{tempdir, TempDir};

    const SCHEMA: &str = r#"
name: test-flow
version: 1
artifacts:
  - { id: strategic-mandate, tier: tier1, generates: tier1/strategic-mandate.md }
gates:
  strategic:
    criteria:
      - id: vision_aligned
        check: field_value
        path: tier1/strategic-mandate.md
        field: vision_aligned
        expected: true
"#;

    struct Fixture {
        dir: TempDir,
        store: InitiativeStore,
        schema: Schema,
    }

    impl Fixture {
        fn new(stage: Stage) -> Self {
            let dir = tempdir().unwrap();
            let store = InitiativeStore::new(dir.path().join("initiatives"));
            let mut state = store.create("init", "Init").unwrap();
            state.stage = stage;
            store.save(&state).unwrap();
            Self {
                dir,
                store,
                schema: parse_schema(SCHEMA, "test-flow").unwrap(),
            }
        }

        fn engine(&self) -> TransitionEngine<'_> {
            TransitionEngine::new(&self.store).with_schema(&self.schema)
        }

        fn write_mandate(&self, aligned: bool) {
            let path = self
                .store
                .initiative_dir("init")
                .join("tier1/strategic-mandate.md");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, format!("---\nvision_aligned: {}\n---\n", aligned)).unwrap();
        }
    }

    #[test]
    fn structurally_invalid_transition_lists_alternatives() {
        let fx = Fixture::new(Stage::Draft);
        let validation = fx
            .engine()
            .can_transition("init", Stage::Draft, Stage::Tier3Active)
            .unwrap();
        assert!(!validation.valid);
        assert_eq!(
            validation.reason.as_deref(),
            Some(
                "Invalid transition: draft -> tier3_active. \
                 Valid transitions: tier1_active, cancelled"
            )
        );
    }

    #[test]
    fn terminal_stage_reports_none() {
        let fx = Fixture::new(Stage::Completed);
        let validation = fx
            .engine()
            .can_transition("init", Stage::Completed, Stage::Draft)
            .unwrap();
        assert!(validation
            .reason
            .unwrap()
            .ends_with("Valid transitions: none"));
    }

    #[test]
    fn unmet_gate_rejects_without_mutating_state() {
        let fx = Fixture::new(Stage::Tier1Active);
        fx.write_mandate(false);
        let before = fs::read_to_string(fx.store.state_path("init")).unwrap();

        let engine = fx.engine();
        let validation = engine
            .can_transition("init", Stage::Tier1Active, Stage::Tier1Approved)
            .unwrap();
        assert_eq!(
            validation.reason.as_deref(),
            Some("Gate criteria not met for 'strategic': vision_aligned")
        );
        assert_eq!(validation.gate_check.as_ref().unwrap().gate, GateId::Strategic);

        let result = engine
            .apply_transition("init", Stage::Tier1Active, Stage::Tier1Approved)
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.new_stage, Stage::Tier1Active);
        assert_eq!(fs::read_to_string(fx.store.state_path("init")).unwrap(), before);
    }

    #[test]
    fn passing_gate_applies_and_records_history() {
        let fx = Fixture::new(Stage::Tier1Active);
        fx.write_mandate(true);

        let events = fx.dir.path().join("events.jsonl");
        let engine = fx
            .engine()
            .with_dispatcher(EventDispatcher::with_log(&events));
        let result = engine
            .apply_transition_as("init", Stage::Tier1Active, Stage::Tier1Approved, Some("council"))
            .unwrap();
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.previous_stage, Stage::Tier1Active);
        assert_eq!(result.new_stage, Stage::Tier1Approved);

        let state = fx.store.load("init").unwrap();
        assert_eq!(state.stage, Stage::Tier1Approved);
        let entry = state.history.last().unwrap();
        assert_eq!(entry.gate, Some(GateId::Strategic));
        assert_eq!(entry.actor.as_deref(), Some("council"));
        assert!(state.metadata.updated_at >= state.metadata.created_at);

        let log = fs::read_to_string(events).unwrap();
        assert!(log.contains("\"event_type\":\"stage_changed\""));
        assert_eq!(engine.current_stage("init").unwrap(), Stage::Tier1Approved);
    }

    #[test]
    fn stale_from_stage_fails_even_when_structurally_valid() {
        let fx = Fixture::new(Stage::Tier2Active);
        let result = fx
            .engine()
            .apply_transition("init", Stage::Draft, Stage::Tier1Active)
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Current stage is tier2_active, expected draft")
        );
        assert_eq!(fx.store.load("init").unwrap().stage, Stage::Tier2Active);
    }

    #[test]
    fn gates_are_skipped_without_schema() {
        let fx = Fixture::new(Stage::Tier1Active);
        let engine = TransitionEngine::new(&fx.store);
        let result = engine
            .apply_transition("init", Stage::Tier1Active, Stage::Tier1Approved)
            .unwrap();
        assert!(result.success);
    }

    #[test]
    fn unknown_initiative_is_an_error() {
        let fx = Fixture::new(Stage::Draft);
        assert!(fx
            .engine()
            .apply_transition("ghost", Stage::Draft, Stage::Tier1Active)
            .is_err());
        assert!(!fx.store.initiative_dir("ghost").exists());
    }

    #[test]
    fn concurrent_transitions_from_same_stage_serialize() {
        let fx = Fixture::new(Stage::Draft);
        let store = Arc::new(fx.store.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    TransitionEngine::new(&store)
                        .apply_transition("init", Stage::Draft, Stage::Tier1Active)
                        .unwrap()
                        .success
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);

        let state = fx.store.load("init").unwrap();
        assert_eq!(state.stage, Stage::Tier1Active);
        assert_eq!(state.history.len(), 1);
    }
}
