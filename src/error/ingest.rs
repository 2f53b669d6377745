use thiserror::Error;

/// Failures of the chain-data feed. Both kinds are recoverable by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("[Ingest] Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("[Ingest] Malformed record: {0}")]
    MalformedRecord(String),
}

impl IngestError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::UpstreamUnavailable(_))
    }
}
