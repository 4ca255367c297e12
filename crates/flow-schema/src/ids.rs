// ids.rs - Closed enumerations for planning tiers and gates.
//
// Tiers and gates are fixed by the workflow: four tiers, each closed by one
// gate. Modelling them as enums (instead of free-form strings) lets the
// transition and gate tables be exhaustive matches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four sequential planning tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Strategic planning.
    Tier1,
    /// Product definition.
    Tier2,
    /// Design and architecture.
    Tier3,
    /// Implementation.
    Tier4,
}

impl Tier {
    /// All tiers in workflow order.
    pub const ALL: [Tier; 4] = [Tier::Tier1, Tier::Tier2, Tier::Tier3, Tier::Tier4];

    /// 1-based position of the tier in the workflow.
    pub fn ordinal(self) -> u8 {
        match self {
            Tier::Tier1 => 1,
            Tier::Tier2 => 2,
            Tier::Tier3 => 3,
            Tier::Tier4 => 4,
        }
    }

    /// The gate that closes this tier.
    pub fn gate(self) -> GateId {
        match self {
            Tier::Tier1 => GateId::Strategic,
            Tier::Tier2 => GateId::Product,
            Tier::Tier3 => GateId::Design,
            Tier::Tier4 => GateId::Implementation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
            Tier::Tier4 => "tier4",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown tier '{}' (expected tier1..tier4)", s))
    }
}

/// A gate guarding the end of a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    Strategic,
    Product,
    Design,
    Implementation,
}

impl GateId {
    /// All gates in workflow order.
    pub const ALL: [GateId; 4] = [
        GateId::Strategic,
        GateId::Product,
        GateId::Design,
        GateId::Implementation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GateId::Strategic => "strategic",
            GateId::Product => "product",
            GateId::Design => "design",
            GateId::Implementation => "implementation",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GateId::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown gate '{}' (expected strategic, product, design, implementation)",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_and_displays() {
        assert_eq!("tier3".parse::<Tier>().unwrap(), Tier::Tier3);
        assert_eq!(Tier::Tier2.to_string(), "tier2");
        assert!("tier5".parse::<Tier>().is_err());
    }

    #[test]
    fn tier_ordinals_follow_workflow_order() {
        let ordinals: Vec<u8> = Tier::ALL.iter().map(|t| t.ordinal()).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
        assert!(Tier::Tier1 < Tier::Tier4);
    }

    #[test]
    fn each_tier_is_closed_by_its_gate() {
        assert_eq!(Tier::Tier1.gate(), GateId::Strategic);
        assert_eq!(Tier::Tier4.gate(), GateId::Implementation);
    }

    #[test]
    fn gate_id_serde_uses_snake_case() {
        let yaml = serde_yaml::to_string(&GateId::Implementation).unwrap();
        assert_eq!(yaml.trim(), "implementation");
        let parsed: GateId = serde_yaml::from_str("design").unwrap();
        assert_eq!(parsed, GateId::Design);
    }
}
