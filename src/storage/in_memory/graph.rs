use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use alloy_primitives::B256;
use petgraph::Direction as EdgeDirection;
use petgraph::graphmap::DiGraphMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use crate::error::AnalysisError;
use crate::model::Address;
use crate::model::Direction;
use crate::model::GraphEdge;
use crate::model::GraphNode;
use crate::model::GraphSnapshot;
use crate::model::Neighbor;
use crate::model::NodeScore;
use crate::model::Subgraph;
use crate::model::Transaction;

/// Address-flow graph.
///
/// Nodes live in an arena keyed by address; the petgraph map only carries the
/// adjacency and the `(from, to)` edge aggregates. Node and edge totals are
/// updated together in `ingest`, so for every node the sum of its outgoing
/// edge values equals `total_out` (and symmetrically for incoming).
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    adjacency: DiGraphMap<Address, GraphEdge>,
    nodes: HashMap<Address, GraphNode>,
    seen: HashSet<B256>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one transaction. Returns `false` when its hash was already ingested.
    pub fn ingest(
        &mut self,
        tx: &Transaction,
    ) -> bool {
        if !self.seen.insert(tx.hash) {
            trace!("ingest::duplicate::{}", tx.hash);
            return false;
        }

        let sender = self.nodes.entry(tx.from).or_insert_with(|| GraphNode::new(tx.from, tx.timestamp));
        sender.out_count += 1;
        sender.total_out = sender.total_out.saturating_add(tx.value);
        sender.touch(tx.timestamp);

        let receiver = self.nodes.entry(tx.to).or_insert_with(|| GraphNode::new(tx.to, tx.timestamp));
        receiver.in_count += 1;
        receiver.total_in = receiver.total_in.saturating_add(tx.value);
        receiver.touch(tx.timestamp);

        if !self.adjacency.contains_edge(tx.from, tx.to) {
            self.adjacency.add_edge(tx.from, tx.to, GraphEdge::new(tx.from, tx.to, tx.timestamp));
        }
        if let Some(edge) = self.adjacency.edge_weight_mut(tx.from, tx.to) {
            edge.tx_count += 1;
            edge.total_value = edge.total_value.saturating_add(tx.value);
            edge.first_timestamp = edge.first_timestamp.min(tx.timestamp);
            edge.last_timestamp = edge.last_timestamp.max(tx.timestamp);
        }

        true
    }

    /// Ingest a page of transactions, returning how many were new.
    pub fn ingest_batch<'a, I>(
        &mut self,
        txs: I,
    ) -> usize
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        txs.into_iter().filter(|tx| self.ingest(tx)).count()
    }

    pub fn contains_transaction(
        &self,
        hash: &B256,
    ) -> bool {
        self.seen.contains(hash)
    }

    pub fn contains_node(
        &self,
        address: &Address,
    ) -> bool {
        self.nodes.contains_key(address)
    }

    pub fn node(
        &self,
        address: &Address,
    ) -> Option<&GraphNode> {
        self.nodes.get(address)
    }

    pub fn edge(
        &self,
        from: Address,
        to: Address,
    ) -> Option<&GraphEdge> {
        self.adjacency.edge_weight(from, to)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.edge_count()
    }

    pub fn transaction_count(&self) -> usize {
        self.seen.len()
    }

    /// Adjacent addresses ordered by total value descending, then earliest
    /// timestamp, then address. With `Direction::Both` the flow in each
    /// direction is combined into one entry per neighbor.
    pub fn neighbors(
        &self,
        address: Address,
        direction: Direction,
        limit: usize,
    ) -> Vec<Neighbor> {
        let mut combined: BTreeMap<Address, Neighbor> = BTreeMap::new();

        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for other in self.adjacency.neighbors_directed(address, EdgeDirection::Outgoing) {
                if let Some(edge) = self.adjacency.edge_weight(address, other) {
                    merge_neighbor(&mut combined, other, edge);
                }
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for other in self.adjacency.neighbors_directed(address, EdgeDirection::Incoming) {
                if let Some(edge) = self.adjacency.edge_weight(other, address) {
                    merge_neighbor(&mut combined, other, edge);
                }
            }
        }

        combined.remove(&address);

        let mut neighbors: Vec<Neighbor> = combined.into_values().collect();
        neighbors.sort_by(|a, b| {
            b.total_value
                .cmp(&a.total_value)
                .then(a.first_timestamp.cmp(&b.first_timestamp))
                .then(a.address.cmp(&b.address))
        });
        neighbors.truncate(limit);
        neighbors
    }

    /// Bounded breadth-first traversal over both edge directions.
    ///
    /// Visits at most `max_nodes` addresses no further than `max_depth` hops
    /// from `root`. Neighbors are expanded in `neighbors` order, so when the
    /// node limit binds the heaviest counterparties are kept. `truncated` is
    /// set whenever a limit left a reachable address unvisited.
    pub fn subgraph(
        &self,
        root: Address,
        max_depth: usize,
        max_nodes: usize,
        cancel: &CancellationToken,
    ) -> Result<Subgraph, AnalysisError> {
        if !self.nodes.contains_key(&root) {
            return Ok(Subgraph::empty(root));
        }
        if max_nodes == 0 {
            // A known root with no room for it: everything was cut
            return Ok(Subgraph {
                truncated: true,
                ..Subgraph::empty(root)
            });
        }

        let mut depths: BTreeMap<Address, usize> = BTreeMap::new();
        let mut order: Vec<Address> = Vec::new();
        let mut queue: VecDeque<Address> = VecDeque::new();
        let mut truncated = false;

        depths.insert(root, 0);
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled(format!("subgraph traversal of {}", root)));
            }
            order.push(current);

            let depth = depths.get(&current).copied().unwrap_or_default();
            for neighbor in self.neighbors(current, Direction::Both, usize::MAX) {
                if depths.contains_key(&neighbor.address) {
                    continue;
                }
                if depth >= max_depth || depths.len() >= max_nodes {
                    truncated = true;
                    continue;
                }
                depths.insert(neighbor.address, depth + 1);
                queue.push_back(neighbor.address);
            }
        }

        let mut edges = Vec::new();
        for from in &order {
            let mut targets: Vec<Address> = self
                .adjacency
                .neighbors_directed(*from, EdgeDirection::Outgoing)
                .filter(|to| depths.contains_key(to))
                .collect();
            targets.sort();
            targets.dedup();
            for to in targets {
                if let Some(edge) = self.adjacency.edge_weight(*from, to) {
                    edges.push(edge.clone());
                }
            }
        }

        let nodes = order.iter().filter_map(|address| self.nodes.get(address).cloned()).collect();

        debug!(
            "subgraph::root::{}::nodes::{}::edges::{}::truncated::{}",
            root,
            order.len(),
            edges.len(),
            truncated
        );

        Ok(Subgraph {
            root,
            nodes,
            edges,
            depths,
            truncated,
        })
    }

    /// Store the latest scores on the nodes they belong to. Unknown addresses
    /// are ignored.
    pub fn record_scores(
        &mut self,
        scores: &[NodeScore],
    ) {
        for score in scores {
            if let Some(node) = self.nodes.get_mut(&score.address) {
                node.risk_score = score.score.clamp(0.0, 1.0);
                node.risk_reasons = score.reasons.clone();
            }
        }
    }

    /// Note that every transaction of `address` has been ingested. Returns
    /// `false` for an address the graph has never seen.
    pub fn mark_history_complete(
        &mut self,
        address: &Address,
    ) -> bool {
        match self.nodes.get_mut(address) {
            Some(node) => {
                node.history_complete = true;
                true
            },
            None => false,
        }
    }

    /// Whole graph in plain record form, nodes by address and edges by pair.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<GraphNode> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.address.cmp(&b.address));

        let mut edges: Vec<GraphEdge> = self.adjacency.all_edges().map(|(_, _, edge)| edge.clone()).collect();
        edges.sort_by(|a, b| (a.from, a.to).cmp(&(b.from, b.to)));

        GraphSnapshot { nodes, edges }
    }
}

fn merge_neighbor(
    combined: &mut BTreeMap<Address, Neighbor>,
    address: Address,
    edge: &GraphEdge,
) {
    let entry = combined.entry(address).or_insert_with(|| Neighbor {
        address,
        total_value: Default::default(),
        tx_count: 0,
        first_timestamp: edge.first_timestamp,
    });
    entry.total_value = entry.total_value.saturating_add(edge.total_value);
    entry.tx_count += edge.tx_count;
    entry.first_timestamp = entry.first_timestamp.min(edge.first_timestamp);
}

// Thread-safe wrapper for the graph
#[derive(Debug, Clone, Default)]
pub struct SharedFlowGraph {
    inner: Arc<RwLock<FlowGraph>>,
}

impl SharedFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ingest(
        &self,
        tx: &Transaction,
    ) -> bool {
        self.inner.write().await.ingest(tx)
    }

    /// Commit a page under a single write lock so readers never observe half
    /// of it.
    pub async fn ingest_batch(
        &self,
        txs: &[Transaction],
    ) -> usize {
        self.inner.write().await.ingest_batch(txs)
    }

    pub async fn neighbors(
        &self,
        address: Address,
        direction: Direction,
        limit: usize,
    ) -> Vec<Neighbor> {
        self.inner.read().await.neighbors(address, direction, limit)
    }

    pub async fn subgraph(
        &self,
        root: Address,
        max_depth: usize,
        max_nodes: usize,
        cancel: &CancellationToken,
    ) -> Result<Subgraph, AnalysisError> {
        self.inner.read().await.subgraph(root, max_depth, max_nodes, cancel)
    }

    pub async fn record_scores(
        &self,
        scores: &[NodeScore],
    ) {
        self.inner.write().await.record_scores(scores);
    }

    pub async fn mark_history_complete(
        &self,
        address: &Address,
    ) -> bool {
        self.inner.write().await.mark_history_complete(address)
    }

    pub async fn node(
        &self,
        address: &Address,
    ) -> Option<GraphNode> {
        self.inner.read().await.node(address).cloned()
    }

    pub async fn edge(
        &self,
        from: Address,
        to: Address,
    ) -> Option<GraphEdge> {
        self.inner.read().await.edge(from, to).cloned()
    }

    pub async fn contains_node(
        &self,
        address: &Address,
    ) -> bool {
        self.inner.read().await.contains_node(address)
    }

    pub async fn node_count(&self) -> usize {
        self.inner.read().await.node_count()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edge_count()
    }

    pub async fn snapshot(&self) -> GraphSnapshot {
        self.inner.read().await.snapshot()
    }

    pub async fn clone_graph(&self) -> FlowGraph {
        self.inner.read().await.clone()
    }
}

impl From<FlowGraph> for SharedFlowGraph {
    fn from(graph: FlowGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }
}
