use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_CONCURRENT_ANALYSES;
use crate::model::AnalysisOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    // Default per-request options
    #[serde(flatten)]
    pub options: AnalysisOptions,
    pub max_concurrent_analyses: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            options: AnalysisOptions::default(),
            max_concurrent_analyses: DEFAULT_MAX_CONCURRENT_ANALYSES,
        }
    }
}
