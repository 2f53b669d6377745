pub mod analyzer;
pub mod blacklist;
pub mod feed;
pub mod log;
pub mod risk;

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

pub use analyzer::AnalyzerConfig;
pub use blacklist::BlacklistConfig;
pub use feed::FeedConfig;
pub use feed::FeedProvider;
pub use log::LoggingConfig;
pub use risk::AddressReuseConfig;
pub use risk::ConcentrationConfig;
pub use risk::LargeValueConfig;
pub use risk::NewAddressConfig;
pub use risk::RiskConfig;
pub use risk::RiskTier;
pub use risk::VelocityConfig;

use crate::err_with_loc;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub risk: RiskConfig,
    pub feed: FeedConfig,
    pub blacklist: BlacklistConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let options = &self.analyzer.options;
        if options.max_nodes == 0 {
            return Err(ConfigError::ValidationError("analyzer.max_nodes must be positive".to_string()));
        }
        if self.analyzer.max_concurrent_analyses == 0 {
            return Err(ConfigError::ValidationError("analyzer.max_concurrent_analyses must be positive".to_string()));
        }
        self.risk.validate()?;
        self.feed.validate()?;
        Ok(())
    }
}

pub async fn load_config(path: impl AsRef<Path>) -> crate::Result<Config> {
    let path = path.as_ref();
    let config_str = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| err_with_loc!(ConfigError::OpenFileError(format!("{}: {}", path.display(), e))))?;
    let config: Config = toml::from_str(&config_str)
        .map_err(|e| err_with_loc!(ConfigError::ParseError(format!("{}: {}", path.display(), e))))?;
    config.validate().map_err(|e| err_with_loc!(e))?;
    Ok(config)
}
