use thiserror::Error;

use super::ingest::IngestError;

/// Errors surfaced by `AnalysisSession::analyze`.
///
/// Cloneable so that a single in-flight analysis can hand the same outcome to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Analysis cancelled: {0}")]
    Cancelled(String),
}

impl AnalysisError {
    pub fn category(&self) -> &'static str {
        match self {
            AnalysisError::InvalidAddress(_) => "validation",
            AnalysisError::UpstreamUnavailable(_) => "upstream",
            AnalysisError::Cancelled(_) => "cancelled",
        }
    }
}

impl From<IngestError> for AnalysisError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::UpstreamUnavailable(msg) => AnalysisError::UpstreamUnavailable(msg),
            IngestError::MalformedRecord(msg) => AnalysisError::UpstreamUnavailable(format!("malformed feed: {}", msg)),
        }
    }
}
