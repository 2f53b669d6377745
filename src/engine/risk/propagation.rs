use std::collections::BTreeMap;
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use super::signals::EdgeIndex;
use crate::error::AnalysisError;
use crate::model::Address;
use crate::model::GraphNode;
use crate::model::Subgraph;
use crate::utils::u256_to_f64;

/// Exposure and path weight of every node of a subgraph.
#[derive(Debug, Default)]
pub(crate) struct Propagation {
    exposure: HashMap<Address, f64>,
    path_weight: HashMap<Address, f64>,
}

impl Propagation {
    pub(crate) fn exposure(
        &self,
        address: &Address,
    ) -> f64 {
        self.exposure.get(address).copied().unwrap_or_default()
    }

    /// Share of a node's score that reaches the root: the decayed product of
    /// edge weights, summed over every layered path.
    pub(crate) fn path_weight(
        &self,
        address: &Address,
    ) -> f64 {
        self.path_weight.get(address).copied().unwrap_or_default()
    }
}

/// Layered propagation over a subgraph.
///
/// Only edges between consecutive BFS layers carry risk, so a node `k` hops
/// out reaches the root through `decay^k` times the product of the edge
/// weights along the way. Same-layer edges carry nothing.
pub(crate) struct Propagator<'a> {
    subgraph: &'a Subgraph,
    edges: &'a EdgeIndex<'a>,
    nodes: HashMap<Address, &'a GraphNode>,
    decay: f64,
}

impl<'a> Propagator<'a> {
    pub(crate) fn new(
        subgraph: &'a Subgraph,
        edges: &'a EdgeIndex<'a>,
        decay: f64,
    ) -> Self {
        Self {
            subgraph,
            edges,
            nodes: subgraph.nodes.iter().map(|node| (node.address, node)).collect(),
            decay,
        }
    }

    pub(crate) fn run(
        &self,
        local: &HashMap<Address, f64>,
        cancel: &CancellationToken,
    ) -> Result<Propagation, AnalysisError> {
        let layers = self.layers();
        let mut propagation = Propagation::default();

        // Outermost layer first, so every child is final before its parent
        for (depth, layer) in layers.iter().rev() {
            for address in layer {
                if cancel.is_cancelled() {
                    return Err(AnalysisError::Cancelled(format!("propagation stopped at {}", address)));
                }

                let exposure: f64 = self
                    .children(address, *depth)
                    .map(|(child, weight)| {
                        let carried = local.get(&child).copied().unwrap_or_default() + propagation.exposure(&child);
                        weight * self.decay * carried
                    })
                    .sum();
                propagation.exposure.insert(*address, exposure);
            }
        }

        propagation.path_weight.insert(self.subgraph.root, 1.0);
        for (depth, layer) in &layers {
            for address in layer {
                let parent_weight = propagation.path_weight(address);
                if parent_weight == 0.0 {
                    continue;
                }
                for (child, weight) in self.children(address, *depth) {
                    *propagation.path_weight.entry(child).or_default() += parent_weight * self.decay * weight;
                }
            }
        }

        Ok(propagation)
    }

    // Addresses per depth, each layer ascending
    fn layers(&self) -> BTreeMap<usize, Vec<Address>> {
        let mut layers: BTreeMap<usize, Vec<Address>> = BTreeMap::new();
        for (address, depth) in &self.subgraph.depths {
            layers.entry(*depth).or_default().push(*address);
        }
        layers
    }

    fn children(
        &self,
        address: &Address,
        depth: usize,
    ) -> impl Iterator<Item = (Address, f64)> {
        let address = *address;
        self.edges
            .neighbors(address)
            .filter(move |neighbor| self.subgraph.depth_of(neighbor) == Some(depth + 1))
            .map(move |neighbor| (*neighbor, self.edge_weight(address, *neighbor)))
    }

    /// Share of `from`'s total flow exchanged with `to`, both directions.
    /// Nodes that only moved zero value are weighted by transaction count.
    fn edge_weight(
        &self,
        from: Address,
        to: Address,
    ) -> f64 {
        let Some(node) = self.nodes.get(&from) else {
            return 0.0;
        };
        let (value, count) = self.edges.pair_flow(from, to);

        let total = u256_to_f64(node.total_flow());
        if total > 0.0 {
            return (u256_to_f64(value) / total).min(1.0);
        }

        let transactions = node.transaction_count();
        if transactions == 0 {
            return 0.0;
        }
        (count as f64 / transactions as f64).min(1.0)
    }
}
