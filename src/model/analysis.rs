use alloy_primitives::U256;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::address::Address;
use super::graph::GraphNode;
use super::graph::GraphSnapshot;
use super::risk::RiskFactor;
use super::risk::RiskLevel;
use crate::constants::DEFAULT_CACHE_TTL_SECONDS;
use crate::constants::DEFAULT_CRAWL_DEPTH;
use crate::constants::DEFAULT_MAX_DEPTH;
use crate::constants::DEFAULT_MAX_NODES;
use crate::constants::DEFAULT_TRANSACTION_CAP;

/// Per-request knobs of `AnalysisSession::analyze`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub max_depth: usize,
    pub max_nodes: usize,
    pub transaction_cap: usize,
    pub cache_ttl_seconds: u64,
    /// Hops of neighbor history to ingest besides the queried address.
    pub crawl_depth: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            transaction_cap: DEFAULT_TRANSACTION_CAP,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            crawl_depth: DEFAULT_CRAWL_DEPTH,
        }
    }
}

/// Activity summary of the queried address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub transaction_count: u64,
    pub counterparties: usize,
    pub first_seen: Option<u64>,
    pub last_seen: Option<u64>,
    pub total_in: U256,
    pub total_out: U256,
}

impl AnalysisStats {
    pub fn from_node(
        node: Option<&GraphNode>,
        counterparties: usize,
    ) -> Self {
        match node {
            Some(node) => Self {
                transaction_count: node.transaction_count(),
                counterparties,
                first_seen: Some(node.first_seen),
                last_seen: Some(node.last_seen),
                total_in: node.total_in,
                total_out: node.total_out,
            },
            None => Self::default(),
        }
    }
}

/// Outcome of one analysis. Shared behind an `Arc` and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub queried_address: Address,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub contributing_factors: Vec<RiskFactor>,
    pub graph: GraphSnapshot,
    /// Traversal was cut short by `max_depth` or `max_nodes`.
    pub truncated: bool,
    /// Ingestion stopped early because the upstream feed failed.
    pub incomplete: bool,
    pub transactions_ingested: usize,
    pub stats: AnalysisStats,
    pub analyzed_at: DateTime<Utc>,
}
