use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    // JSON array of blacklist entries loaded at startup
    pub seed_path: Option<PathBuf>,
    pub include_builtin: bool,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            seed_path: None,
            include_builtin: true,
        }
    }
}
