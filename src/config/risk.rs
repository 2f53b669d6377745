use alloy_primitives::U256;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ADDRESS_REUSE_MIN_TRANSACTIONS;
use crate::constants::DEFAULT_ADDRESS_REUSE_RATIO;
use crate::constants::DEFAULT_ADDRESS_REUSE_WEIGHT;
use crate::constants::DEFAULT_CONCENTRATION_MIN_COUNTERPARTIES;
use crate::constants::DEFAULT_CONCENTRATION_SHARE;
use crate::constants::DEFAULT_CONCENTRATION_WEIGHT;
use crate::constants::DEFAULT_DECAY_FACTOR;
use crate::constants::DEFAULT_LARGE_VALUE_MIN_EDGES;
use crate::constants::DEFAULT_LARGE_VALUE_RATIO;
use crate::constants::DEFAULT_LARGE_VALUE_WEIGHT;
use crate::constants::DEFAULT_NEW_ADDRESS_MAX_AGE_SECONDS;
use crate::constants::DEFAULT_NEW_ADDRESS_MIN_VALUE_ETHER;
use crate::constants::DEFAULT_NEW_ADDRESS_WEIGHT;
use crate::constants::DEFAULT_VELOCITY_MAX_PER_HOUR;
use crate::constants::DEFAULT_VELOCITY_MIN_TRANSACTIONS;
use crate::constants::DEFAULT_VELOCITY_WEIGHT;
use crate::error::ConfigError;
use crate::model::RiskLevel;
use crate::utils::parse_ether_value;

/// Weights and thresholds of the risk engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub decay_factor: f64,
    pub concentration: ConcentrationConfig,
    pub velocity: VelocityConfig,
    pub new_address: NewAddressConfig,
    pub large_value: LargeValueConfig,
    pub address_reuse: AddressReuseConfig,
    pub tiers: Vec<RiskTier>,
}

/// One sender supplying most of a node's inflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcentrationConfig {
    pub weight: f64,
    pub share_threshold: f64,
    pub min_counterparties: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    pub weight: f64,
    pub max_per_hour: f64,
    pub min_transactions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAddressConfig {
    pub weight: f64,
    pub max_age_seconds: u64,
    pub min_value_ether: f64,
}

/// Many edges far above the node's mean edge value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LargeValueConfig {
    pub weight: f64,
    pub ratio_threshold: f64,
    /// Fewest counterparty edges (not transactions) the node needs before
    /// its edge values are compared.
    pub min_edges: u64,
}

/// Few distinct addresses across many transactions:
/// `1 - unique / (2 * transactions)` above `ratio_threshold`, where `unique`
/// counts the node and its counterparties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressReuseConfig {
    pub weight: f64,
    pub ratio_threshold: f64,
    pub min_transactions: u64,
}

/// Lower bound (inclusive) of a risk level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub level: RiskLevel,
    pub min_score: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            decay_factor: DEFAULT_DECAY_FACTOR,
            concentration: ConcentrationConfig::default(),
            velocity: VelocityConfig::default(),
            new_address: NewAddressConfig::default(),
            large_value: LargeValueConfig::default(),
            address_reuse: AddressReuseConfig::default(),
            tiers: default_tiers(),
        }
    }
}

impl Default for ConcentrationConfig {
    fn default() -> Self {
        Self {
            weight: DEFAULT_CONCENTRATION_WEIGHT,
            share_threshold: DEFAULT_CONCENTRATION_SHARE,
            min_counterparties: DEFAULT_CONCENTRATION_MIN_COUNTERPARTIES,
        }
    }
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            weight: DEFAULT_VELOCITY_WEIGHT,
            max_per_hour: DEFAULT_VELOCITY_MAX_PER_HOUR,
            min_transactions: DEFAULT_VELOCITY_MIN_TRANSACTIONS,
        }
    }
}

impl Default for NewAddressConfig {
    fn default() -> Self {
        Self {
            weight: DEFAULT_NEW_ADDRESS_WEIGHT,
            max_age_seconds: DEFAULT_NEW_ADDRESS_MAX_AGE_SECONDS,
            min_value_ether: DEFAULT_NEW_ADDRESS_MIN_VALUE_ETHER,
        }
    }
}

impl Default for LargeValueConfig {
    fn default() -> Self {
        Self {
            weight: DEFAULT_LARGE_VALUE_WEIGHT,
            ratio_threshold: DEFAULT_LARGE_VALUE_RATIO,
            min_edges: DEFAULT_LARGE_VALUE_MIN_EDGES,
        }
    }
}

impl Default for AddressReuseConfig {
    fn default() -> Self {
        Self {
            weight: DEFAULT_ADDRESS_REUSE_WEIGHT,
            ratio_threshold: DEFAULT_ADDRESS_REUSE_RATIO,
            min_transactions: DEFAULT_ADDRESS_REUSE_MIN_TRANSACTIONS,
        }
    }
}

impl NewAddressConfig {
    pub fn min_value_wei(&self) -> U256 {
        parse_ether_value(&format!("{:.18}", self.min_value_ether)).unwrap_or(U256::MAX)
    }
}

pub fn default_tiers() -> Vec<RiskTier> {
    vec![
        RiskTier {
            level: RiskLevel::Low,
            min_score: 0.0,
        },
        RiskTier {
            level: RiskLevel::Medium,
            min_score: 0.2,
        },
        RiskTier {
            level: RiskLevel::High,
            min_score: 0.5,
        },
        RiskTier {
            level: RiskLevel::Critical,
            min_score: 0.8,
        },
    ]
}

impl RiskConfig {
    /// Highest tier whose lower bound does not exceed `score`.
    pub fn level_for(
        &self,
        score: f64,
    ) -> RiskLevel {
        self.tiers
            .iter()
            .take_while(|tier| tier.min_score <= score)
            .last()
            .map(|tier| tier.level)
            .unwrap_or(RiskLevel::Low)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "risk.decay_factor must be in (0, 1), got {}",
                self.decay_factor
            )));
        }

        let weights = [
            ("concentration", self.concentration.weight),
            ("velocity", self.velocity.weight),
            ("new_address", self.new_address.weight),
            ("large_value", self.large_value.weight),
            ("address_reuse", self.address_reuse.weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::ValidationError(format!("risk.{}.weight must be >= 0, got {}", name, weight)));
            }
        }

        if !(self.concentration.share_threshold > 0.0 && self.concentration.share_threshold <= 1.0) {
            return Err(ConfigError::ValidationError("risk.concentration.share_threshold must be in (0, 1]".to_string()));
        }
        if !(0.0..=1.0).contains(&self.large_value.ratio_threshold) {
            return Err(ConfigError::ValidationError("risk.large_value.ratio_threshold must be in [0, 1]".to_string()));
        }
        if !(0.0..1.0).contains(&self.address_reuse.ratio_threshold) {
            return Err(ConfigError::ValidationError("risk.address_reuse.ratio_threshold must be in [0, 1)".to_string()));
        }
        if !(self.velocity.max_per_hour > 0.0) {
            return Err(ConfigError::ValidationError("risk.velocity.max_per_hour must be positive".to_string()));
        }
        if !self.new_address.min_value_ether.is_finite() || self.new_address.min_value_ether < 0.0 {
            return Err(ConfigError::ValidationError("risk.new_address.min_value_ether must be >= 0".to_string()));
        }

        match self.tiers.first() {
            Some(first) if first.min_score == 0.0 => {},
            _ => return Err(ConfigError::ValidationError("risk.tiers must start at 0".to_string())),
        }
        for pair in self.tiers.windows(2) {
            if pair[1].min_score <= pair[0].min_score || pair[1].level <= pair[0].level {
                return Err(ConfigError::ValidationError("risk.tiers must be strictly ascending".to_string()));
            }
        }
        if self.tiers.iter().any(|tier| tier.min_score > 1.0) {
            return Err(ConfigError::ValidationError("risk.tiers bounds must be within [0, 1]".to_string()));
        }

        Ok(())
    }
}
