use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::address::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// What produced a contribution to a score.
///
/// Variant order doubles as the tie-break order when two factors contribute
/// the same amount.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactorKind {
    BlacklistHit { category: String, source: String },
    HighVelocity,
    ValueConcentration { counterparty: Address },
    NewAddressLargeTransfers,
    LargeValueDominance,
    AddressReuse,
    NeighborExposure { hops: usize },
}

impl FactorKind {
    pub fn name(&self) -> &'static str {
        match self {
            FactorKind::BlacklistHit { .. } => "blacklist_hit",
            FactorKind::HighVelocity => "high_velocity",
            FactorKind::ValueConcentration { .. } => "value_concentration",
            FactorKind::NewAddressLargeTransfers => "new_address_large_transfers",
            FactorKind::LargeValueDominance => "large_value_dominance",
            FactorKind::AddressReuse => "address_reuse",
            FactorKind::NeighborExposure { .. } => "neighbor_exposure",
        }
    }
}

/// One explained contribution to a risk score.
///
/// `raw_weight` is the signal's own strength (configured weight, blacklist
/// confidence, or the neighbor's local score); `contribution` is what it
/// actually added after decay and edge weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub kind: FactorKind,
    /// Address the signal was observed on.
    pub address: Address,
    pub raw_weight: f64,
    pub contribution: f64,
}

impl RiskFactor {
    pub fn local(
        kind: FactorKind,
        address: Address,
        weight: f64,
    ) -> Self {
        Self {
            kind,
            address,
            raw_weight: weight,
            contribution: weight,
        }
    }
}

/// Score computed for one graph node, written back to the graph after an
/// analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub address: Address,
    pub score: f64,
    pub reasons: Vec<RiskFactor>,
}
