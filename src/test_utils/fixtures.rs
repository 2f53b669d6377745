use alloy_primitives::B256;
use alloy_primitives::U256;
use chrono::TimeZone;
use chrono::Utc;
use serde_json::Value;
use serde_json::json;

use crate::model::Address;
use crate::model::AnalysisResult;
use crate::model::AnalysisStats;
use crate::model::GraphSnapshot;
use crate::model::RiskLevel;
use crate::model::Transaction;

/// Test fixtures for creating consistent test data
pub struct TestFixtures;

impl TestFixtures {
    /// Deterministic address: a marker byte followed by `n` big-endian.
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
            hash: Self::tx_hash(id),
            from,
            to,
            value: U256::from(value),
            timestamp,
            block_height: timestamp / 12,
            gas_used: Some(21_000),
            gas_price: None,
        }
    }

    /// Raw feed record with the value given in wei.
    pub fn record(
        id: u64,
        from: Address,
        to: Address,
        value_wei: u128,
        timestamp: u64,
    ) -> Value {
        json!({
            "hash": Self::tx_hash(id).to_string(),
            "from": from.to_string(),
            "to": to.to_string(),
            "value": value_wei.to_string(),
            "timestamp": timestamp,
            "blockNumber": timestamp / 12,
            "success": true
        })
    }

    /// `n` distinct addresses, numbered from 1.
    pub fn chain(n: u64) -> Vec<Address> {
        (1..=n).map(Self::address).collect()
    }

    /// One transfer along every consecutive pair, `chain[i] -> chain[i + 1]`.
    pub fn chain_transfers(
        chain: &[Address],
        value: u128,
    ) -> Vec<Transaction> {
        chain
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Self::transfer(i as u64 + 1, pair[0], pair[1], value, 1_000 + i as u64))
            .collect()
    }

    pub fn analysis_result(address: Address) -> AnalysisResult {
        AnalysisResult {
            queried_address: address,
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            contributing_factors: Vec::new(),
            graph: GraphSnapshot::default(),
            truncated: false,
            incomplete: false,
            transactions_ingested: 0,
            stats: AnalysisStats::default(),
            analyzed_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default(),
        }
    }
}
