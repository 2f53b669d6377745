use std::collections::BTreeMap;
use std::collections::HashMap;

use alloy_primitives::U256;
use serde::Deserialize;
use serde::Serialize;

use super::address::Address;
use super::risk::NodeScore;
use super::risk::RiskFactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub address: Address,
    pub in_count: u64,
    pub out_count: u64,
    pub total_in: U256,
    pub total_out: U256,
    pub first_seen: u64,
    pub last_seen: u64,
    pub risk_score: f64,
    pub risk_reasons: Vec<RiskFactor>,
    /// The whole history of this address was read from the feed, not only the
    /// transfers seen from its counterparties.
    #[serde(default)]
    pub history_complete: bool,
}

impl GraphNode {
    pub fn new(
        address: Address,
        timestamp: u64,
    ) -> Self {
        Self {
            address,
            in_count: 0,
            out_count: 0,
            total_in: U256::ZERO,
            total_out: U256::ZERO,
            first_seen: timestamp,
            last_seen: timestamp,
            risk_score: 0.0,
            risk_reasons: Vec::new(),
            history_complete: false,
        }
    }

    pub fn transaction_count(&self) -> u64 {
        self.in_count + self.out_count
    }

    pub fn total_flow(&self) -> U256 {
        self.total_in.saturating_add(self.total_out)
    }

    /// Seconds between the first and last observed transaction.
    pub fn active_span(&self) -> u64 {
        self.last_seen.saturating_sub(self.first_seen)
    }

    pub(crate) fn touch(
        &mut self,
        timestamp: u64,
    ) {
        self.first_seen = self.first_seen.min(timestamp);
        self.last_seen = self.last_seen.max(timestamp);
    }
}

/// Aggregate of every transaction from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: Address,
    pub to: Address,
    pub tx_count: u64,
    pub total_value: U256,
    pub first_timestamp: u64,
    pub last_timestamp: u64,
}

impl GraphEdge {
    pub fn new(
        from: Address,
        to: Address,
        timestamp: u64,
    ) -> Self {
        Self {
            from,
            to,
            tx_count: 0,
            total_value: U256::ZERO,
            first_timestamp: timestamp,
            last_timestamp: timestamp,
        }
    }
}

/// An adjacent address with the flow aggregated over the requested direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub address: Address,
    pub total_value: U256,
    pub tx_count: u64,
    pub first_timestamp: u64,
}

/// Bounded neighbourhood of an address, as returned by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub root: Address,
    /// Nodes in visit order, root first.
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Hop distance of every visited node from the root.
    pub depths: BTreeMap<Address, usize>,
    pub truncated: bool,
}

impl Subgraph {
    pub fn empty(root: Address) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            edges: Vec::new(),
            depths: BTreeMap::new(),
            truncated: false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> usize {
        self.depths.values().copied().max().unwrap_or(0)
    }

    pub fn contains(
        &self,
        address: &Address,
    ) -> bool {
        self.depths.contains_key(address)
    }

    pub fn depth_of(
        &self,
        address: &Address,
    ) -> Option<usize> {
        self.depths.get(address).copied()
    }

    pub fn node(
        &self,
        address: &Address,
    ) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.address == *address)
    }

    /// Copy freshly computed scores onto the nodes of this subgraph.
    pub fn apply_scores(
        &mut self,
        scores: &[NodeScore],
    ) {
        let by_address: HashMap<Address, &NodeScore> = scores.iter().map(|s| (s.address, s)).collect();
        for node in self.nodes.iter_mut() {
            if let Some(score) = by_address.get(&node.address) {
                node.risk_score = score.score;
                node.risk_reasons = score.reasons.clone();
            }
        }
    }
}

/// Plain nested-record form of (part of) the graph for external transmission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl From<Subgraph> for GraphSnapshot {
    fn from(subgraph: Subgraph) -> Self {
        Self {
            nodes: subgraph.nodes,
            edges: subgraph.edges,
        }
    }
}
