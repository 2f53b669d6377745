use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_LOG_DIRECTORY;
use crate::constants::DEFAULT_LOG_LEVEL;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    // Directory where logs will be stored, no file output when unset
    pub directory: Option<String>,
    // Terminal level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: Some(DEFAULT_LOG_DIRECTORY.to_string()),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
