// stage.rs - Stage: the initiative lifecycle enumeration.
//
// The valid transitions form a directed graph:
//   draft → tier1_active → tier1_approved → tier2_active → ... → tier4_active
//     → tier4_review → tier4_approved → completed
//   tierN_active ⇄ tierN_blocked
//   tierN_active / tierN_blocked → tier(N-1)_active   (escalation, N = 2..4)
//   tier4_review → tier4_active                        (changes requested)
//   draft / tier1_active / tier1_blocked → cancelled
//
// `completed` and `cancelled` are terminal. Entering a tier's `_approved`
// stage requires that tier's gate to pass.

use std::fmt;
use std::str::FromStr;

use flow_schema::{GateId, Tier};
use serde::{Deserialize, Serialize};

/// The lifecycle stage of an initiative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Draft,
    Tier1Active,
    Tier1Approved,
    Tier1Blocked,
    Tier2Active,
    Tier2Approved,
    Tier2Blocked,
    Tier3Active,
    Tier3Approved,
    Tier3Blocked,
    Tier4Active,
    /// Implementation submitted for review.
    Tier4Review,
    Tier4Approved,
    Tier4Blocked,
    Completed,
    Cancelled,
}

use Stage::*;

impl Stage {
    /// All stages in lifecycle order.
    pub const ALL: [Stage; 16] = [
        Draft,
        Tier1Active,
        Tier1Approved,
        Tier1Blocked,
        Tier2Active,
        Tier2Approved,
        Tier2Blocked,
        Tier3Active,
        Tier3Approved,
        Tier3Blocked,
        Tier4Active,
        Tier4Review,
        Tier4Approved,
        Tier4Blocked,
        Completed,
        Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Draft => "draft",
            Tier1Active => "tier1_active",
            Tier1Approved => "tier1_approved",
            Tier1Blocked => "tier1_blocked",
            Tier2Active => "tier2_active",
            Tier2Approved => "tier2_approved",
            Tier2Blocked => "tier2_blocked",
            Tier3Active => "tier3_active",
            Tier3Approved => "tier3_approved",
            Tier3Blocked => "tier3_blocked",
            Tier4Active => "tier4_active",
            Tier4Review => "tier4_review",
            Tier4Approved => "tier4_approved",
            Tier4Blocked => "tier4_blocked",
            Completed => "completed",
            Cancelled => "cancelled",
        }
    }

    /// Stages reachable from this one in a single transition.
    pub fn valid_transitions(self) -> &'static [Stage] {
        match self {
            Draft => &[Tier1Active, Cancelled],

            Tier1Active => &[Tier1Approved, Tier1Blocked, Cancelled],
            Tier1Approved => &[Tier2Active],
            Tier1Blocked => &[Tier1Active, Cancelled],

            // From tier 2 on, active and blocked stages can escalate back.
            Tier2Active => &[Tier2Approved, Tier2Blocked, Tier1Active],
            Tier2Approved => &[Tier3Active],
            Tier2Blocked => &[Tier2Active, Tier1Active],

            Tier3Active => &[Tier3Approved, Tier3Blocked, Tier2Active],
            Tier3Approved => &[Tier4Active],
            Tier3Blocked => &[Tier3Active, Tier2Active],

            Tier4Active => &[Tier4Review, Tier4Blocked, Tier3Active],
            Tier4Review => &[Tier4Approved, Tier4Active],
            Tier4Approved => &[Completed],
            Tier4Blocked => &[Tier4Active, Tier3Active],

            Completed | Cancelled => &[],
        }
    }

    /// Structural check only: is `next` in this stage's transition list?
    pub fn can_transition_to(self, next: Stage) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// The gate that must pass before entering this stage, if any.
    pub fn required_gate(self) -> Option<GateId> {
        match self {
            Tier1Approved => Some(GateId::Strategic),
            Tier2Approved => Some(GateId::Product),
            Tier3Approved => Some(GateId::Design),
            Tier4Approved => Some(GateId::Implementation),
            _ => None,
        }
    }

    /// The next stage on the happy path, ignoring blocked and escalation edges.
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            Draft => Some(Tier1Active),
            Tier1Active => Some(Tier1Approved),
            Tier1Approved => Some(Tier2Active),
            Tier1Blocked => Some(Tier1Active),
            Tier2Active => Some(Tier2Approved),
            Tier2Approved => Some(Tier3Active),
            Tier2Blocked => Some(Tier2Active),
            Tier3Active => Some(Tier3Approved),
            Tier3Approved => Some(Tier4Active),
            Tier3Blocked => Some(Tier3Active),
            Tier4Active => Some(Tier4Review),
            Tier4Review => Some(Tier4Approved),
            Tier4Approved => Some(Completed),
            Tier4Blocked => Some(Tier4Active),
            Completed | Cancelled => None,
        }
    }

    /// Where an escalation from this stage lands: the previous tier's active stage.
    pub fn escalation_target(self) -> Option<Stage> {
        match self {
            Tier2Active | Tier2Blocked => Some(Tier1Active),
            Tier3Active | Tier3Blocked => Some(Tier2Active),
            Tier4Active | Tier4Blocked => Some(Tier3Active),
            _ => None,
        }
    }

    /// The tier this stage belongs to (`None` for draft and terminal stages).
    pub fn tier(self) -> Option<Tier> {
        match self {
            Tier1Active | Tier1Approved | Tier1Blocked => Some(Tier::Tier1),
            Tier2Active | Tier2Approved | Tier2Blocked => Some(Tier::Tier2),
            Tier3Active | Tier3Approved | Tier3Blocked => Some(Tier::Tier3),
            Tier4Active | Tier4Review | Tier4Approved | Tier4Blocked => Some(Tier::Tier4),
            Draft | Completed | Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Completed | Cancelled)
    }

    pub fn is_blocked(self) -> bool {
        matches!(self, Tier1Blocked | Tier2Blocked | Tier3Blocked | Tier4Blocked)
    }

    /// Whether the stage records a passed gate (`tierN_approved`).
    pub fn is_approved(self) -> bool {
        matches!(
            self,
            Tier1Approved | Tier2Approved | Tier3Approved | Tier4Approved
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}
