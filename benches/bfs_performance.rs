use std::collections::BTreeMap;
use std::hint::black_box;
use std::time::Duration;

use alloy_primitives::B256;
use alloy_primitives::U256;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use darkblock::config::RiskConfig;
use darkblock::engine::RiskEngine;
use darkblock::model::Address;
use darkblock::model::BlacklistEntry;
use darkblock::model::Transaction;
use darkblock::storage::FlowGraph;
use tokio_util::sync::CancellationToken;

fn address(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xbe;
    bytes[12..].copy_from_slice(&n.to_be_bytes());
    Address::new(bytes)
}

/// Layered fan-out: every node of a layer sends to `fan_out` fresh nodes,
/// plus a few transfers back into the previous layer to create cycles.
fn layered_transfers(
    layers: u32,
    fan_out: u64,
) -> Vec<Transaction> {
    let mut transfers = Vec::new();
    let mut frontier = vec![1u64];
    let mut next_id = 2u64;

    for layer in 0..layers {
        let mut next = Vec::new();
        for (i, from) in frontier.iter().enumerate() {
            for k in 0..fan_out {
                let to = next_id;
                next_id += 1;
                transfers.push(transfer(transfers.len() as u64, *from, to, 1_000 + k * 37, layer as u64 * 3_600 + k));
                next.push(to);
            }
            if i > 0 {
                transfers.push(transfer(transfers.len() as u64, frontier[i - 1], *from, 500, layer as u64 * 3_600));
            }
        }
        frontier = next;
    }
    transfers
}

fn transfer(
    id: u64,
    from: u64,
    to: u64,
    value: u64,
    timestamp: u64,
) -> Transaction {
    Transaction {
        hash: B256::left_padding_from(&id.to_be_bytes()),
        from: address(from),
        to: address(to),
        value: U256::from(value),
        timestamp,
        block_height: timestamp / 12,
        gas_used: None,
        gas_price: None,
    }
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow_graph_ingest");
    group.measurement_time(Duration::from_secs(10));

    for fan_out in [4u64, 8, 16] {
        let transfers = layered_transfers(3, fan_out);
        group.throughput(Throughput::Elements(transfers.len() as u64));
        group.bench_with_input(BenchmarkId::new("layered", fan_out), &transfers, |b, transfers| {
            b.iter(|| {
                let mut graph = FlowGraph::new();
                black_box(graph.ingest_batch(transfers))
            });
        });
    }

    group.finish();
}

fn bench_subgraph(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_subgraph");
    group.measurement_time(Duration::from_secs(10));

    let mut graph = FlowGraph::new();
    graph.ingest_batch(&layered_transfers(4, 12));
    let cancel = CancellationToken::new();

    for max_nodes in [50usize, 500, 5_000] {
        group.bench_with_input(BenchmarkId::new("max_nodes", max_nodes), &max_nodes, |b, &max_nodes| {
            b.iter(|| black_box(graph.subgraph(address(1), 3, max_nodes, &cancel)));
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("risk_evaluation");
    group.measurement_time(Duration::from_secs(10));

    let mut graph = FlowGraph::new();
    graph.ingest_batch(&layered_transfers(3, 8));
    let cancel = CancellationToken::new();
    let engine = RiskEngine::new(RiskConfig::default());

    let mut hits: BTreeMap<Address, Vec<BlacklistEntry>> = BTreeMap::new();
    for n in (10..500).step_by(25) {
        hits.entry(address(n))
            .or_default()
            .push(BlacklistEntry::new(address(n), "mixer", "bench", 0.8));
    }

    for max_nodes in [50usize, 500] {
        let subgraph = match graph.subgraph(address(1), 3, max_nodes, &cancel) {
            Ok(subgraph) => subgraph,
            Err(e) => panic!("subgraph failed: {}", e),
        };
        group.throughput(Throughput::Elements(subgraph.node_count() as u64));
        group.bench_with_input(BenchmarkId::new("nodes", max_nodes), &subgraph, |b, subgraph| {
            b.iter(|| black_box(engine.evaluate(subgraph, &hits, &cancel)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_subgraph, bench_evaluate);
criterion_main!(benches);
