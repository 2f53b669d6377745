use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlacklistError {
    #[error("[Blacklist] Malformed record: {0}")]
    MalformedRecord(String),

    #[error("[Blacklist] Failed to read seed file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("[Blacklist] Failed to parse seed file: {0}")]
    ParseError(#[from] serde_json::Error),
}
