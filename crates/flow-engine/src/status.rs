// status.rs - StatusEngine: artifact, tier, and initiative status.
//
// An artifact is `done` when its `generates` path (or at least one match of
// its glob) exists; otherwise it is `blocked` if any direct dependency is not
// done, else `ready`. Dependency done-ness is checked one level deep only.

use chrono::{DateTime, Utc};
use flow_initiative::{Escalation, InitiativeStore, Stage};
use flow_schema::{ArtifactDefinition, GateId, Schema, Tier};
use serde::{Deserialize, Serialize};

use crate::document::ArtifactTree;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Done,
    Ready,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatusResult {
    pub id: String,
    pub tier: Tier,
    pub status: ArtifactStatus,
    /// Set when exactly one file matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Every matched file, relative to the initiative root.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Direct dependencies that are not done.
    #[serde(default)]
    pub missing_deps: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierStatusResult {
    pub tier: Tier,
    pub name: String,
    pub council: String,
    pub artifacts: Vec<ArtifactStatusResult>,
    /// Done artifacts as a percentage of the tier's artifacts; unrounded.
    pub completion_pct: f64,
    pub is_blocked: bool,
    /// Missing dependency ids across the tier, first-seen order, no repeats.
    pub blocked_by: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Passed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateProgress {
    pub id: GateId,
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed_at: Option<DateTime<Utc>>,
}

/// The artifact to work on next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    pub artifact: String,
    pub tier: Tier,
    pub description: String,
    pub generates: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativeStatusResult {
    pub initiative: String,
    pub title: String,
    pub current_stage: Stage,
    pub current_tier: Option<Tier>,
    pub completed_tiers: Vec<Tier>,
    pub artifacts: Vec<ArtifactStatusResult>,
    pub gates: Vec<GateProgress>,
    pub escalations: Vec<Escalation>,
    pub blockers: Vec<String>,
    pub next_action: Option<NextAction>,
    pub is_complete: bool,
}

/// Computes status for initiatives in a store against one schema.
pub struct StatusEngine<'a> {
    schema: &'a Schema,
    store: &'a InitiativeStore,
}

impl<'a> StatusEngine<'a> {
    pub fn new(schema: &'a Schema, store: &'a InitiativeStore) -> Self {
        Self { schema, store }
    }

    fn tree(&self, initiative_id: &str) -> ArtifactTree {
        ArtifactTree::new(self.store.initiative_dir(initiative_id))
    }

    /// Matched files for an artifact; non-empty means done.
    fn produced(
        &self,
        tree: &ArtifactTree,
        artifact: &ArtifactDefinition,
    ) -> Result<Vec<String>, EngineError> {
        if artifact.is_multi_file() {
            tree.glob(&artifact.generates)
        } else if tree.exists(&artifact.generates) {
            Ok(vec![artifact.generates.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    pub fn artifact_status(
        &self,
        initiative_id: &str,
        artifact_id: &str,
    ) -> Result<ArtifactStatusResult, EngineError> {
        let artifact = self
            .schema
            .artifact(artifact_id)
            .ok_or_else(|| EngineError::ArtifactNotFound(artifact_id.to_string()))?;
        let tree = self.tree(initiative_id);

        let paths = self.produced(&tree, artifact)?;
        if !paths.is_empty() {
            return Ok(ArtifactStatusResult {
                id: artifact.id.clone(),
                tier: artifact.tier,
                status: ArtifactStatus::Done,
                path: (paths.len() == 1).then(|| paths[0].clone()),
                paths,
                missing_deps: Vec::new(),
                description: artifact.description.clone(),
            });
        }

        let mut missing_deps = Vec::new();
        for dep_id in &artifact.requires {
            // Unknown ids were reported when the schema loaded.
            let Some(dep) = self.schema.artifact(dep_id) else {
                continue;
            };
            if self.produced(&tree, dep)?.is_empty() {
                missing_deps.push(dep_id.clone());
            }
        }

        Ok(ArtifactStatusResult {
            id: artifact.id.clone(),
            tier: artifact.tier,
            status: if missing_deps.is_empty() {
                ArtifactStatus::Ready
            } else {
                ArtifactStatus::Blocked
            },
            path: None,
            paths: Vec::new(),
            missing_deps,
            description: artifact.description.clone(),
        })
    }

    /// Status of every artifact, in dependency order.
    pub fn all_artifact_statuses(
        &self,
        initiative_id: &str,
    ) -> Result<Vec<ArtifactStatusResult>, EngineError> {
        self.schema
            .artifact_order()
            .iter()
            .map(|id| self.artifact_status(initiative_id, id))
            .collect()
    }

    pub fn tier_status(
        &self,
        initiative_id: &str,
        tier: Tier,
    ) -> Result<TierStatusResult, EngineError> {
        let definition = self
            .schema
            .tier(tier)
            .ok_or(EngineError::TierNotFound(tier))?;

        let artifacts = self
            .schema
            .tier_artifacts(tier)
            .into_iter()
            .map(|a| self.artifact_status(initiative_id, &a.id))
            .collect::<Result<Vec<_>, _>>()?;

        let done = artifacts
            .iter()
            .filter(|a| a.status == ArtifactStatus::Done)
            .count();
        let completion_pct = if artifacts.is_empty() {
            0.0
        } else {
            done as f64 / artifacts.len() as f64 * 100.0
        };

        let mut blocked_by: Vec<String> = Vec::new();
        for artifact in artifacts.iter().filter(|a| a.status == ArtifactStatus::Blocked) {
            for dep in &artifact.missing_deps {
                if !blocked_by.contains(dep) {
                    blocked_by.push(dep.clone());
                }
            }
        }

        Ok(TierStatusResult {
            tier,
            name: definition.name.clone(),
            council: definition.council.clone(),
            is_blocked: artifacts.iter().any(|a| a.status == ArtifactStatus::Blocked),
            artifacts,
            completion_pct,
            blocked_by,
        })
    }

    /// Full status: stage, tiers, artifacts, gates, and the next action.
    pub fn initiative_status(
        &self,
        initiative_id: &str,
    ) -> Result<InitiativeStatusResult, EngineError> {
        let state = self.store.load(initiative_id)?;
        let artifacts = self.all_artifact_statuses(initiative_id)?;

        let gates = GateId::ALL
            .into_iter()
            .map(|gate| match state.gate_passed_at(gate) {
                Some(at) => GateProgress {
                    id: gate,
                    status: GateStatus::Passed,
                    passed_at: Some(at),
                },
                None => GateProgress {
                    id: gate,
                    status: GateStatus::Pending,
                    passed_at: None,
                },
            })
            .collect();

        let is_complete = state.stage == Stage::Completed;
        let next_action = if is_complete {
            None
        } else {
            self.next_action(&artifacts)
        };

        Ok(InitiativeStatusResult {
            initiative: initiative_id.to_string(),
            title: state.metadata.title,
            current_stage: state.stage,
            current_tier: state.stage.tier(),
            completed_tiers: completed_tiers(state.stage),
            artifacts,
            gates,
            escalations: state.escalations,
            blockers: state.blockers,
            next_action,
            is_complete,
        })
    }

    /// The first `ready` artifact in dependency order.
    fn next_action(&self, artifacts: &[ArtifactStatusResult]) -> Option<NextAction> {
        self.schema.artifact_order().iter().find_map(|id| {
            let status = artifacts.iter().find(|a| &a.id == id)?;
            if status.status != ArtifactStatus::Ready {
                return None;
            }
            let artifact = self.schema.artifact(id)?;
            Some(NextAction {
                artifact: id.clone(),
                tier: status.tier,
                description: format!("Create {}", id),
                generates: artifact.generates.clone(),
            })
        })
    }
}

/// Tiers whose work is finished at `stage`: every tier before the current
/// one, plus the current one once approved. All tiers when completed.
pub fn completed_tiers(stage: Stage) -> Vec<Tier> {
    if stage == Stage::Completed {
        return Tier::ALL.to_vec();
    }
    let Some(current) = stage.tier() else {
        return Vec::new();
    };
    Tier::ALL
        .into_iter()
        .filter(|t| t.ordinal() < current.ordinal() || (*t == current && stage.is_approved()))
        .collect()
}
