use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_API_KEY_ENV;
use crate::constants::DEFAULT_BASE_RETRY_DELAY_MS;
use crate::constants::DEFAULT_ETHPLORER_URL;
use crate::constants::DEFAULT_MAX_RETRIES;
use crate::constants::DEFAULT_MAX_RETRY_DELAY_MS;
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::constants::DEFAULT_REQUEST_TIMEOUT_MS;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedProvider {
    Ethplorer,
    // Records from a local JSON file
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub provider: FeedProvider,
    pub base_url: String,
    pub api_key: Option<String>,
    // Read through dotenvy when `api_key` is unset
    pub api_key_env: Option<String>,
    pub replay_path: Option<PathBuf>,
    pub page_size: usize,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            provider: FeedProvider::Ethplorer,
            base_url: DEFAULT_ETHPLORER_URL.to_string(),
            api_key: None,
            api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
            replay_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_retry_delay_ms: DEFAULT_BASE_RETRY_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

impl FeedConfig {
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        let name = self
            .api_key_env
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("feed.api_key_env".to_string()))?;
        dotenvy::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ValidationError("feed.page_size must be positive".to_string()));
        }
        if self.base_retry_delay_ms > self.max_retry_delay_ms {
            return Err(ConfigError::ValidationError(
                "feed.base_retry_delay_ms exceeds feed.max_retry_delay_ms".to_string(),
            ));
        }
        match self.provider {
            FeedProvider::Ethplorer => {
                url::Url::parse(&self.base_url)
                    .map_err(|e| ConfigError::ValidationError(format!("feed.base_url {}: {}", self.base_url, e)))?;
            },
            FeedProvider::Replay if self.replay_path.is_none() => {
                return Err(ConfigError::ValidationError("feed.replay_path is required by the replay provider".to_string()));
            },
            FeedProvider::Replay => {},
        }
        Ok(())
    }
}
