use alloy_primitives::B256;
use alloy_primitives::U256;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use super::address::Address;
use crate::error::IngestError;
use crate::utils::parse_ether_value;
use crate::utils::parse_u64_value;
use crate::utils::parse_wei_value;

/// A normalized value transfer between two addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: B256,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub timestamp: u64,
    pub block_height: u64,
    pub gas_used: Option<u64>,
    pub gas_price: Option<U256>,
}

/// Outcome of parsing one feed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Transfer(Transaction),
    // Reverted on chain, moved no value
    Failed(B256),
}

impl Transaction {
    /// Parse one raw feed record.
    ///
    /// Accepted shapes follow the common explorer APIs: `value` as a JSON
    /// number is an ether amount (Ethplorer), as a string it is wei in decimal
    /// or `0x` hex (Etherscan / JSON-RPC). `rawValue`, when present, wins.
    pub fn from_record(record: &Value) -> Result<ParsedRecord, IngestError> {
        let object = record
            .as_object()
            .ok_or_else(|| IngestError::MalformedRecord(format!("record is not an object: {}", record)))?;

        let field = |names: &[&str]| first_present(object, names);

        let hash_raw = field(&["hash", "txHash", "transactionHash"])
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::MalformedRecord("missing hash".to_string()))?;
        let hash: B256 = hash_raw
            .parse()
            .map_err(|_| IngestError::MalformedRecord(format!("invalid hash: {}", hash_raw)))?;

        let from = parse_address_field(field(&["from", "from_address"]), "from", &hash)?;
        let to = parse_address_field(field(&["to", "to_address"]), "to", &hash)?;

        let value = match (field(&["rawValue", "raw_value"]), field(&["value"])) {
            (Some(raw), _) => parse_wei_value(raw),
            (None, Some(Value::Number(n))) => parse_ether_value(&n.to_string()),
            (None, Some(other)) => parse_wei_value(other),
            (None, None) => None,
        }
        .ok_or_else(|| IngestError::MalformedRecord(format!("invalid value for {}", hash)))?;

        let timestamp = field(&["timestamp", "timeStamp"])
            .and_then(parse_u64_value)
            .ok_or_else(|| IngestError::MalformedRecord(format!("invalid timestamp for {}", hash)))?;

        let block_height = match field(&["blockNumber", "block_height", "blockHeight"]) {
            Some(v) => parse_u64_value(v)
                .ok_or_else(|| IngestError::MalformedRecord(format!("invalid block height for {}", hash)))?,
            None => 0,
        };

        let gas_used = field(&["gasUsed", "gas_used"]).and_then(parse_u64_value);
        let gas_price = field(&["gasPrice", "gas_price"]).and_then(parse_wei_value);

        let success = match field(&["success", "status"]) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !matches!(s.as_str(), "0" | "0x0" | "false"),
            Some(Value::Number(n)) => n.as_u64() != Some(0),
            _ => true,
        };
        if !success {
            return Ok(ParsedRecord::Failed(hash));
        }

        Ok(ParsedRecord::Transfer(Transaction {
            hash,
            from,
            to,
            value,
            timestamp,
            block_height,
            gas_used,
            gas_price,
        }))
    }
}

fn first_present<'a>(
    object: &'a Map<String, Value>,
    names: &[&str],
) -> Option<&'a Value> {
    names.iter().filter_map(|name| object.get(*name)).find(|v| !v.is_null())
}

fn parse_address_field(
    value: Option<&Value>,
    name: &str,
    hash: &B256,
) -> Result<Address, IngestError> {
    let raw = value
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::MalformedRecord(format!("missing {} for {}", name, hash)))?;
    raw.parse()
        .map_err(|_| IngestError::MalformedRecord(format!("invalid {} address {} for {}", name, raw, hash)))
}
