mod propagation;
mod signals;

use std::collections::BTreeMap;
use std::collections::HashMap;

use alloy_primitives::U256;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use self::propagation::Propagator;
use self::signals::EdgeIndex;
use self::signals::SignalEvaluator;
use self::signals::blacklist_factor;
use self::signals::local_score;
use crate::config::RiskConfig;
use crate::error::AnalysisError;
use crate::model::Address;
use crate::model::BlacklistEntry;
use crate::model::FactorKind;
use crate::model::NodeScore;
use crate::model::RiskFactor;
use crate::model::RiskLevel;
use crate::model::Subgraph;

/// Score of the queried address plus the scores of every node it was
/// derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    /// Sorted by contribution, highest first.
    pub factors: Vec<RiskFactor>,
    pub node_scores: Vec<NodeScore>,
}

/// Turns a subgraph and its blacklist hits into an explainable score.
///
/// Evaluation is pure: the same subgraph, hits and configuration always give
/// the same assessment, down to factor order.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
    min_new_address_value: U256,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        let min_new_address_value = config.new_address.min_value_wei();
        Self {
            config,
            min_new_address_value,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn level_for(
        &self,
        score: f64,
    ) -> RiskLevel {
        self.config.level_for(score)
    }

    pub fn evaluate(
        &self,
        subgraph: &Subgraph,
        blacklist_hits: &BTreeMap<Address, Vec<BlacklistEntry>>,
        cancel: &CancellationToken,
    ) -> Result<RiskAssessment, AnalysisError> {
        let root = subgraph.root;
        let edges = EdgeIndex::new(&subgraph.edges);
        let evaluator = SignalEvaluator::new(&self.config, self.min_new_address_value);
        let hits_of = |address: &Address| blacklist_hits.get(address).map(Vec::as_slice).unwrap_or_default();

        let mut local_factors: HashMap<Address, Vec<RiskFactor>> = HashMap::with_capacity(subgraph.node_count());
        let mut local: HashMap<Address, f64> = HashMap::with_capacity(subgraph.node_count());
        for node in &subgraph.nodes {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled(format!("scoring stopped at {}", node.address)));
            }
            let factors = evaluator.local_factors(node, &edges, hits_of(&node.address));
            local.insert(node.address, local_score(&factors));
            local_factors.insert(node.address, factors);
        }

        // An address without history can still be listed
        let root_factors = match local_factors.get(&root) {
            Some(factors) => factors.clone(),
            None => blacklist_factor(root, hits_of(&root))
                .into_iter()
                .filter(|factor| factor.contribution > 0.0)
                .collect(),
        };

        let propagation = Propagator::new(subgraph, &edges, self.config.decay_factor).run(&local, cancel)?;

        let score = (local_score(&root_factors) + propagation.exposure(&root)).clamp(0.0, 1.0);
        let level = self.level_for(score);

        let mut factors = root_factors;
        for node in &subgraph.nodes {
            if node.address == root {
                continue;
            }
            let node_local = local.get(&node.address).copied().unwrap_or_default();
            let contribution = node_local * propagation.path_weight(&node.address);
            if contribution <= 0.0 {
                continue;
            }
            factors.push(RiskFactor {
                kind: FactorKind::NeighborExposure {
                    hops: subgraph.depth_of(&node.address).unwrap_or_default(),
                },
                address: node.address,
                raw_weight: node_local,
                contribution,
            });
        }
        sort_factors(&mut factors);

        let node_scores = subgraph
            .nodes
            .iter()
            .map(|node| {
                let node_local = local.get(&node.address).copied().unwrap_or_default();
                let mut reasons = local_factors.remove(&node.address).unwrap_or_default();
                sort_factors(&mut reasons);
                NodeScore {
                    address: node.address,
                    score: (node_local + propagation.exposure(&node.address)).clamp(0.0, 1.0),
                    reasons,
                }
            })
            .collect();

        debug!(
            "risk::evaluate::{}::score::{:.4}::level::{}::factors::{}::nodes::{}",
            root,
            score,
            level,
            factors.len(),
            subgraph.node_count()
        );

        Ok(RiskAssessment {
            score,
            level,
            factors,
            node_scores,
        })
    }
}

/// Contribution descending, then factor kind, then address.
fn sort_factors(factors: &mut [RiskFactor]) {
    factors.sort_by(|a, b| {
        b.contribution
            .total_cmp(&a.contribution)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.address.cmp(&b.address))
    });
}
