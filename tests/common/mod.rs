#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use alloy_primitives::B256;
use alloy_primitives::U256;
use async_trait::async_trait;
use darkblock::config::RiskConfig;
use darkblock::engine::AnalysisSession;
use darkblock::engine::RiskEngine;
use darkblock::error::IngestError;
use darkblock::model::Address;
use darkblock::model::GraphSnapshot;
use darkblock::model::Transaction;
use darkblock::pipeline::Cursor;
use darkblock::pipeline::FeedPage;
use darkblock::pipeline::RetryPolicy;
use darkblock::pipeline::TransactionFeed;
use darkblock::pipeline::TransactionIngestor;
use darkblock::storage::ResultCache;
use darkblock::storage::SharedBlacklistIndex;
use darkblock::storage::SharedFlowGraph;
use serde_json::Value;
use serde_json::json;

pub const NO_RETRY: RetryPolicy = RetryPolicy {
    max_retries: 0,
    base_delay_ms: 1,
    max_delay_ms: 1,
};

pub fn address(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xd0;
    bytes[12..].copy_from_slice(&n.to_be_bytes());
    Address::new(bytes)
}

pub fn tx_hash(id: u64) -> B256 {
    B256::left_padding_from(&id.to_be_bytes())
}

pub fn transfer(
    id: u64,
    from: Address,
    to: Address,
    value: u128,
    timestamp: u64,
) -> Transaction {
    Transaction {
        hash: tx_hash(id),
        from,
        to,
        value: U256::from(value),
        timestamp,
        block_height: timestamp / 12,
        gas_used: None,
        gas_price: None,
    }
}

/// Raw record as a JSON-RPC style feed would return it, value in wei.
pub fn record(
    id: u64,
    from: Address,
    to: Address,
    value_wei: u128,
    timestamp: u64,
) -> Value {
    json!({
        "hash": tx_hash(id).to_string(),
        "from": from.to_string(),
        "to": to.to_string(),
        "value": value_wei.to_string(),
        "timestamp": timestamp,
        "blockNumber": timestamp / 12,
        "success": true
    })
}

pub fn session_with(feed: Arc<dyn TransactionFeed>) -> AnalysisSession {
    AnalysisSession::new(
        SharedFlowGraph::new(),
        SharedBlacklistIndex::new(),
        ResultCache::new(),
        TransactionIngestor::new(feed, NO_RETRY),
        RiskEngine::new(RiskConfig::default()),
    )
}

/// Feed that is always down.
#[derive(Debug, Default)]
pub struct FailingFeed {
    fetches: AtomicUsize,
}

impl FailingFeed {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionFeed for FailingFeed {
    async fn fetch(
        &self,
        _address: Address,
        _cursor: Option<Cursor>,
    ) -> Result<FeedPage, IngestError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Err(IngestError::UpstreamUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Every node's totals equal the sum of its edges.
pub fn reconciles(snapshot: &GraphSnapshot) -> bool {
    snapshot.nodes.iter().all(|node| {
        let (out, inflow) = snapshot.edges.iter().fold((U256::ZERO, U256::ZERO), |(out, inflow), edge| {
            let out = if edge.from == node.address { out.saturating_add(edge.total_value) } else { out };
            let inflow = if edge.to == node.address { inflow.saturating_add(edge.total_value) } else { inflow };
            (out, inflow)
        });
        out == node.total_out && inflow == node.total_in
    })
}

pub fn assert_close(
    actual: f64,
    expected: f64,
) {
    assert!((actual - expected).abs() <= 1e-9, "expected {} to be close to {}", actual, expected);
}
