use std::collections::BTreeSet;
use std::collections::HashMap;

use alloy_primitives::U256;

use crate::config::RiskConfig;
use crate::model::Address;
use crate::model::BlacklistEntry;
use crate::model::FactorKind;
use crate::model::GraphEdge;
use crate::model::GraphNode;
use crate::model::RiskFactor;
use crate::utils::u256_to_f64;

const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Edges of a subgraph grouped per endpoint.
///
/// Self-transfers stay in `incoming`/`outgoing` but never make an address
/// its own neighbor.
#[derive(Debug, Default)]
pub(crate) struct EdgeIndex<'a> {
    incoming: HashMap<Address, Vec<&'a GraphEdge>>,
    outgoing: HashMap<Address, Vec<&'a GraphEdge>>,
    neighbors: HashMap<Address, BTreeSet<Address>>,
    // Keyed by (lower, higher) address; value and count of both directions
    pairs: HashMap<(Address, Address), (U256, u64)>,
}

impl<'a> EdgeIndex<'a> {
    pub(crate) fn new(edges: &'a [GraphEdge]) -> Self {
        let mut index = Self::default();
        for edge in edges {
            index.outgoing.entry(edge.from).or_default().push(edge);
            index.incoming.entry(edge.to).or_default().push(edge);
            if edge.from == edge.to {
                continue;
            }

            index.neighbors.entry(edge.from).or_default().insert(edge.to);
            index.neighbors.entry(edge.to).or_default().insert(edge.from);

            let pair = index.pairs.entry(pair_key(edge.from, edge.to)).or_insert((U256::ZERO, 0));
            pair.0 = pair.0.saturating_add(edge.total_value);
            pair.1 = pair.1.saturating_add(edge.tx_count);
        }
        index
    }

    pub(crate) fn incoming(
        &self,
        address: &Address,
    ) -> &[&'a GraphEdge] {
        self.incoming.get(address).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn outgoing(
        &self,
        address: &Address,
    ) -> &[&'a GraphEdge] {
        self.outgoing.get(address).map(Vec::as_slice).unwrap_or_default()
    }

    /// Distinct counterparties, ascending.
    pub(crate) fn neighbors(
        &self,
        address: Address,
    ) -> impl Iterator<Item = &Address> {
        self.neighbors.get(&address).into_iter().flatten()
    }

    pub(crate) fn pair_flow(
        &self,
        a: Address,
        b: Address,
    ) -> (U256, u64) {
        self.pairs.get(&pair_key(a, b)).copied().unwrap_or((U256::ZERO, 0))
    }
}

fn pair_key(
    a: Address,
    b: Address,
) -> (Address, Address) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Local signals of one node, before any propagation.
pub(crate) struct SignalEvaluator<'c> {
    config: &'c RiskConfig,
    min_new_address_value: U256,
}

impl<'c> SignalEvaluator<'c> {
    pub(crate) fn new(
        config: &'c RiskConfig,
        min_new_address_value: U256,
    ) -> Self {
        Self {
            config,
            min_new_address_value,
        }
    }

    /// Every triggered signal with a non-zero weight.
    pub(crate) fn local_factors(
        &self,
        node: &GraphNode,
        edges: &EdgeIndex<'_>,
        hits: &[BlacklistEntry],
    ) -> Vec<RiskFactor> {
        [
            blacklist_factor(node.address, hits),
            self.concentration(node, edges),
            self.velocity(node),
            self.new_address(node),
            self.large_value(node, edges),
            self.address_reuse(node, edges),
        ]
        .into_iter()
        .flatten()
        .filter(|factor| factor.contribution > 0.0)
        .collect()
    }

    fn concentration(
        &self,
        node: &GraphNode,
        edges: &EdgeIndex<'_>,
    ) -> Option<RiskFactor> {
        let config = &self.config.concentration;
        let senders: Vec<&GraphEdge> =
            edges.incoming(&node.address).iter().copied().filter(|edge| edge.from != node.address).collect();
        if senders.len() < config.min_counterparties {
            return None;
        }

        let total_in = u256_to_f64(node.total_in);
        if total_in <= 0.0 {
            return None;
        }

        // Largest sender, lowest address on ties
        let top = senders
            .iter()
            .max_by(|a, b| a.total_value.cmp(&b.total_value).then_with(|| b.from.cmp(&a.from)))?;
        let share = u256_to_f64(top.total_value) / total_in;

        (share >= config.share_threshold).then(|| {
            RiskFactor::local(
                FactorKind::ValueConcentration { counterparty: top.from },
                node.address,
                config.weight,
            )
        })
    }

    fn velocity(
        &self,
        node: &GraphNode,
    ) -> Option<RiskFactor> {
        let config = &self.config.velocity;
        let count = node.transaction_count();
        if count < config.min_transactions {
            return None;
        }

        // Bursts shorter than an hour are measured against a full hour
        let hours = (node.active_span() as f64 / SECONDS_PER_HOUR).max(1.0);
        let per_hour = count as f64 / hours;

        (per_hour >= config.max_per_hour)
            .then(|| RiskFactor::local(FactorKind::HighVelocity, node.address, config.weight))
    }

    fn new_address(
        &self,
        node: &GraphNode,
    ) -> Option<RiskFactor> {
        // Age is only known once the oldest transfer has been read
        if !node.history_complete {
            return None;
        }
        let config = &self.config.new_address;
        let young = node.active_span() < config.max_age_seconds;
        let large = node.total_flow() >= self.min_new_address_value;

        (young && large).then(|| RiskFactor::local(FactorKind::NewAddressLargeTransfers, node.address, config.weight))
    }

    fn large_value(
        &self,
        node: &GraphNode,
        edges: &EdgeIndex<'_>,
    ) -> Option<RiskFactor> {
        let config = &self.config.large_value;
        let values: Vec<f64> = edges
            .outgoing(&node.address)
            .iter()
            .chain(edges.incoming(&node.address).iter().filter(|edge| edge.from != node.address))
            .map(|edge| u256_to_f64(edge.total_value))
            .collect();
        if (values.len() as u64) < config.min_edges {
            return None;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        if mean <= 0.0 {
            return None;
        }
        let large = values.iter().filter(|value| **value > mean * 2.0).count();
        let ratio = large as f64 / values.len() as f64;

        (ratio > config.ratio_threshold)
            .then(|| RiskFactor::local(FactorKind::LargeValueDominance, node.address, config.weight))
    }

    /// Transactions repeatedly cycling through the same few counterparties.
    fn address_reuse(
        &self,
        node: &GraphNode,
        edges: &EdgeIndex<'_>,
    ) -> Option<RiskFactor> {
        let config = &self.config.address_reuse;
        // A self-transfer sits in both lists but is one transaction
        let transactions: u64 = edges
            .outgoing(&node.address)
            .iter()
            .chain(edges.incoming(&node.address).iter().filter(|edge| edge.from != node.address))
            .map(|edge| edge.tx_count)
            .sum();
        if transactions == 0 || transactions < config.min_transactions {
            return None;
        }

        let unique = edges.neighbors(node.address).count() + 1;
        let ratio = 1.0 - unique as f64 / (2 * transactions) as f64;

        (ratio > config.ratio_threshold)
            .then(|| RiskFactor::local(FactorKind::AddressReuse, node.address, config.weight))
    }
}

/// Strongest blacklist entry of `address`. Entries arrive sorted by source, so
/// ties keep the first source.
pub(crate) fn blacklist_factor(
    address: Address,
    hits: &[BlacklistEntry],
) -> Option<RiskFactor> {
    let strongest = hits.iter().reduce(|best, entry| if entry.confidence > best.confidence { entry } else { best })?;
    Some(RiskFactor::local(
        FactorKind::BlacklistHit {
            category: strongest.category.clone(),
            source: strongest.source.clone(),
        },
        address,
        strongest.confidence,
    ))
}

pub(crate) fn local_score(factors: &[RiskFactor]) -> f64 {
    factors.iter().map(|factor| factor.contribution).sum::<f64>().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::storage::FlowGraph;
    use crate::test_utils::fixtures::TestFixtures;

    const ETHER: u128 = 1_000_000_000_000_000_000;

    fn evaluate(
        graph: &FlowGraph,
        address: Address,
    ) -> Vec<FactorKind> {
        let snapshot = graph.snapshot();
        let edges = EdgeIndex::new(&snapshot.edges);
        let config = RiskConfig::default();
        let evaluator = SignalEvaluator::new(&config, config.new_address.min_value_wei());
        let node = graph.node(&address).unwrap();
        evaluator.local_factors(node, &edges, &[]).into_iter().map(|factor| factor.kind).collect()
    }

    #[test]
    fn test_concentration_needs_enough_senders() {
        let target = TestFixtures::address(100);
        let mut graph = FlowGraph::new();
        graph.ingest(&TestFixtures::transfer(1, TestFixtures::address(1), target, 90, 10));
        graph.ingest(&TestFixtures::transfer(2, TestFixtures::address(2), target, 5, 20));
        assert!(evaluate(&graph, target).is_empty());

        graph.ingest(&TestFixtures::transfer(3, TestFixtures::address(3), target, 5, 30));
        assert_eq!(
            evaluate(&graph, target),
            vec![FactorKind::ValueConcentration {
                counterparty: TestFixtures::address(1)
            }]
        );
    }

    #[rstest]
    #[case(25, 3_600, true)]
    #[case(25, 7_200, false)]
    #[case(9, 0, false)]
    #[case(20, 60, true)]
    fn test_velocity(
        #[case] count: u64,
        #[case] span: u64,
        #[case] fires: bool,
    ) {
        let source = TestFixtures::address(1);
        let mut graph = FlowGraph::new();
        for i in 0..count {
            let ts = 1_000 + span * i / count.saturating_sub(1).max(1);
            graph.ingest(&TestFixtures::transfer(i, source, TestFixtures::address(1_000 + i), 1, ts));
        }

        assert_eq!(evaluate(&graph, source).contains(&FactorKind::HighVelocity), fires);
    }

    #[test]
    fn test_new_address_with_large_flow() {
        let young = TestFixtures::address(1);
        let mut graph = FlowGraph::new();
        graph.ingest(&TestFixtures::transfer(1, TestFixtures::address(2), young, 150 * ETHER, 1_000));
        assert!(evaluate(&graph, young).is_empty());

        graph.mark_history_complete(&young);
        assert_eq!(evaluate(&graph, young), vec![FactorKind::NewAddressLargeTransfers]);

        // Same flow spread over more than a day
        graph.ingest(&TestFixtures::transfer(2, young, TestFixtures::address(3), 1, 1_000 + 86_400));
        assert!(!evaluate(&graph, young).contains(&FactorKind::NewAddressLargeTransfers));
    }

    #[test]
    fn test_large_value_dominance() {
        let hub = TestFixtures::address(1);
        let mut graph = FlowGraph::new();
        for i in 0..4 {
            graph.ingest(&TestFixtures::transfer(i, hub, TestFixtures::address(10 + i), 1, 100 + i * 86_400));
        }
        graph.ingest(&TestFixtures::transfer(9, TestFixtures::address(50), hub, 1_000, 1_000_000));
        graph.ingest(&TestFixtures::transfer(10, TestFixtures::address(51), hub, 1_000, 1_000_001));

        // 2 of 6 edges carry more than twice the mean
        assert_eq!(evaluate(&graph, hub), vec![FactorKind::LargeValueDominance]);
    }

    #[rstest]
    // 12 transfers with one counterparty: 1 - 2/24
    #[case::one_counterparty(1, 12, true)]
    // 12 transfers over 3 counterparties: 1 - 4/24
    #[case::few_counterparties(3, 4, true)]
    // 12 transfers to 12 counterparties: 1 - 13/24
    #[case::spread_out(12, 1, false)]
    // 1 - 2/8, but below the transaction floor
    #[case::too_few_transactions(1, 4, false)]
    fn test_address_reuse(
        #[case] counterparties: u64,
        #[case] transfers_each: u64,
        #[case] fires: bool,
    ) {
        let wallet = TestFixtures::address(1);
        let mut graph = FlowGraph::new();
        let mut id = 0;
        for c in 0..counterparties {
            for t in 0..transfers_each {
                id += 1;
                let peer = TestFixtures::address(100 + c);
                let (from, to) = if t % 2 == 0 { (wallet, peer) } else { (peer, wallet) };
                graph.ingest(&TestFixtures::transfer(id, from, to, 1, 1_000 + id * 86_400));
            }
        }

        assert_eq!(evaluate(&graph, wallet).contains(&FactorKind::AddressReuse), fires);
    }

    #[test]
    fn test_blacklist_factor_takes_max_confidence() {
        let bad = TestFixtures::address(1);
        let hits = vec![
            BlacklistEntry::new(bad, "scam", "a", 0.4),
            BlacklistEntry::new(bad, "mixer", "b", 0.9),
            BlacklistEntry::new(bad, "hack", "c", 0.9),
        ];
        let factor = blacklist_factor(bad, &hits).unwrap();
        assert_eq!(
            factor.kind,
            FactorKind::BlacklistHit {
                category: "mixer".to_string(),
                source: "b".to_string()
            }
        );
        assert_eq!(factor.contribution, 0.9);
        assert!(blacklist_factor(bad, &[]).is_none());
    }

    #[test]
    fn test_local_score_is_clamped() {
        let address = TestFixtures::address(1);
        let factors = vec![
            RiskFactor::local(FactorKind::HighVelocity, address, 0.7),
            RiskFactor::local(FactorKind::LargeValueDominance, address, 0.6),
        ];
        assert_eq!(local_score(&factors), 1.0);
        assert_eq!(local_score(&[]), 0.0);
    }

    #[test]
    fn test_edge_index_pairs_both_directions() {
        let a = TestFixtures::address(1);
        let b = TestFixtures::address(2);
        let mut graph = FlowGraph::new();
        graph.ingest(&TestFixtures::transfer(1, a, b, 30, 10));
        graph.ingest(&TestFixtures::transfer(2, b, a, 12, 20));
        graph.ingest(&TestFixtures::transfer(3, a, a, 99, 30));
        let snapshot = graph.snapshot();
        let edges = EdgeIndex::new(&snapshot.edges);

        assert_eq!(edges.pair_flow(b, a), (U256::from(42u64), 2));
        assert_eq!(edges.neighbors(a).copied().collect::<Vec<_>>(), vec![b]);
    }
}
