use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::Cursor;
use super::FeedPage;
use super::TransactionFeed;
use crate::config::FeedConfig;
use crate::constants::ETHPLORER_FREE_KEY;
use crate::error::IngestError;
use crate::model::Address;
use crate::utils::is_retryable_error;
use crate::utils::parse_u64_value;

/// Ethplorer `getAddressTransactions` client.
///
/// The API returns the newest transfers first and pages backwards through
/// the `timestamp` parameter, so the cursor is the oldest timestamp of the
/// previous page. Transfers sharing that timestamp come back on the next
/// page and are dropped by the ingestor's hash de-duplication.
#[derive(Debug, Clone)]
pub struct EthplorerFeed {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: usize,
}

impl EthplorerFeed {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        page_size: usize,
        request_timeout: Duration,
    ) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IngestError::UpstreamUnavailable(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size: page_size.max(1),
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, IngestError> {
        let api_key = config.resolve_api_key().unwrap_or_else(|e| {
            warn!("ethplorer::{}::using_free_key", e);
            ETHPLORER_FREE_KEY.to_string()
        });
        Self::new(
            config.base_url.clone(),
            api_key,
            config.page_size,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    fn page_from_body(
        &self,
        address: Address,
        body: Value,
        cursor: Option<&Cursor>,
    ) -> Result<FeedPage, IngestError> {
        let records = match body {
            Value::Array(records) => records,
            Value::Object(object) => {
                let message = object
                    .get("error")
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| "unexpected object body".to_string());
                return Err(IngestError::UpstreamUnavailable(format!("ethplorer error: {}", message)));
            },
            other => {
                return Err(IngestError::UpstreamUnavailable(format!("unexpected body: {}", other)));
            },
        };

        if records.len() < self.page_size {
            return Ok(FeedPage {
                records,
                next_cursor: None,
            });
        }

        let oldest = records
            .iter()
            .filter_map(|record| record.get("timestamp").and_then(parse_u64_value))
            .min();
        let previous = cursor.and_then(|c| c.as_str().parse::<u64>().ok());

        let next_cursor = match oldest {
            // A full page inside a single second would be requested forever
            Some(ts) if Some(ts) == previous => {
                warn!(
                    "ethplorer::second_overflow::{}::timestamp::{}::page::{}::later_transfers_skipped",
                    address,
                    ts,
                    records.len()
                );
                ts.checked_sub(1).map(|ts| Cursor::new(ts.to_string()))
            },
            Some(ts) => Some(Cursor::new(ts.to_string())),
            None => None,
        };

        Ok(FeedPage { records, next_cursor })
    }
}

#[async_trait]
impl TransactionFeed for EthplorerFeed {
    async fn fetch(
        &self,
        address: Address,
        cursor: Option<Cursor>,
    ) -> Result<FeedPage, IngestError> {
        let url = format!("{}/getAddressTransactions/{}", self.base_url, address);
        let mut query = vec![("apiKey", self.api_key.clone()), ("limit", self.page_size.to_string())];
        if let Some(cursor) = &cursor {
            query.push(("timestamp", cursor.to_string()));
        }

        debug!("ethplorer::fetch::{}::cursor::{:?}", address, cursor);

        let response = self.client.get(&url).query(&query).send().await.map_err(|e| {
            let message = e.to_string();
            if e.is_timeout() || e.is_connect() || is_retryable_error(&message) {
                debug!("ethplorer::transient_failure::{}::{}", address, message);
            } else {
                warn!("ethplorer::request_failed::{}::{}", address, message);
            }
            IngestError::UpstreamUnavailable(format!("request failed: {}", message))
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(IngestError::UpstreamUnavailable(format!("ethplorer returned {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IngestError::UpstreamUnavailable(format!("invalid body ({}): {}", status, e)))?;

        self.page_from_body(address, body, cursor.as_ref())
    }

    fn name(&self) -> &'static str {
        "ethplorer"
    }
}
