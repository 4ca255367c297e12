// state.rs - InitiativeState: the persisted record of one initiative.
//
// Serialized as YAML to `openspec/initiatives/<id>/state.yaml`:
//
//   metadata: { id, title, created_at, updated_at, mode, allow_overlap }
//   stage: tier2_active
//   history: [ { from, to, timestamp, gate?, actor? } ]
//   escalations: [ { id, from_tier, to_tier, severity, reason, created_at,
//                    resolved_at?, resolution? } ]
//   blockers: [ "free text" ]
//
// History is append-only. The only writers are initiative creation and the
// transition engine.

use chrono::{DateTime, Utc};
use flow_schema::{GateId, Tier};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// How strictly gates are reviewed for an initiative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every gate passage is reviewed by the owning council.
    #[default]
    Strict,
    /// Gates pass as soon as their criteria are met.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeMetadata {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub mode: Mode,
    /// Whether work on the next tier may start before the current gate passes.
    #[serde(default)]
    pub allow_overlap: bool,
}

/// One applied stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    pub timestamp: DateTime<Utc>,
    /// The gate that had to pass for this transition, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// A cross-tier issue raised against an earlier tier.
///
/// Open escalations block every gate until they are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: String,
    pub from_tier: Tier,
    pub to_tier: Tier,
    pub severity: Severity,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl Escalation {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeState {
    pub metadata: InitiativeMetadata,
    pub stage: Stage,
    #[serde(default)]
    pub history: Vec<StageTransition>,
    #[serde(default)]
    pub escalations: Vec<Escalation>,
    #[serde(default)]
    pub blockers: Vec<String>,
}

impl InitiativeState {
    /// A fresh initiative in the `draft` stage.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            metadata: InitiativeMetadata {
                id: id.into(),
                title: title.into(),
                created_at: now,
                updated_at: now,
                mode: Mode::default(),
                allow_overlap: false,
            },
            stage: Stage::Draft,
            history: Vec::new(),
            escalations: Vec::new(),
            blockers: Vec::new(),
        }
    }

    pub fn open_escalations(&self) -> impl Iterator<Item = &Escalation> {
        self.escalations.iter().filter(|e| e.is_open())
    }

    /// Move to `to`, stamping `updated_at` and appending a history entry.
    ///
    /// Does not validate the move; callers check the transition table and
    /// gates first.
    pub fn record_transition(&mut self, to: Stage, actor: Option<String>) -> &StageTransition {
        let now = Utc::now();
        let from = self.stage;
        self.stage = to;
        self.metadata.updated_at = now;
        self.history.push(StageTransition {
            from,
            to,
            timestamp: now,
            gate: to.required_gate(),
            actor,
        });
        &self.history[self.history.len() - 1]
    }

    /// When `gate` was first recorded as passed, if ever.
    pub fn gate_passed_at(&self, gate: GateId) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .find(|t| t.gate == Some(gate))
            .map(|t| t.timestamp)
    }
}
