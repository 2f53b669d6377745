use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::address::Address;
use crate::error::BlacklistError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub address: Address,
    pub category: String,
    pub source: String,
    pub confidence: f64,
}

impl BlacklistEntry {
    pub fn new(
        address: Address,
        category: impl Into<String>,
        source: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            address,
            category: category.into(),
            source: source.into(),
            confidence,
        }
    }

    /// Parse and validate one externally supplied record.
    pub fn from_record(record: &Value) -> Result<Self, BlacklistError> {
        let entry: BlacklistEntry = serde_json::from_value(record.clone())
            .map_err(|e| BlacklistError::MalformedRecord(format!("{}: {}", e, record)))?;
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<(), BlacklistError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(BlacklistError::MalformedRecord(format!(
                "confidence {} out of range for {}",
                self.confidence, self.address
            )));
        }
        if self.source.trim().is_empty() {
            return Err(BlacklistError::MalformedRecord(format!("empty source for {}", self.address)));
        }
        Ok(())
    }
}

/// One message of a blacklist feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BlacklistUpdate {
    Upsert { entry: BlacklistEntry },
    Remove { address: Address, source: String },
}
