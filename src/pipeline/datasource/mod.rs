pub mod ethplorer;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

pub use ethplorer::EthplorerFeed;
pub use memory::MemoryFeed;

use crate::config::FeedConfig;
use crate::config::FeedProvider;
use crate::err_with_loc;
use crate::error::IngestError;
use crate::model::Address;

/// Opaque continuation token handed back by a feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of raw records. `next_cursor == None` marks the end of data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedPage {
    pub records: Vec<Value>,
    pub next_cursor: Option<Cursor>,
}

/// Paginated source of raw transaction records for an address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionFeed: Send + Sync {
    async fn fetch(
        &self,
        address: Address,
        cursor: Option<Cursor>,
    ) -> Result<FeedPage, IngestError>;

    fn name(&self) -> &'static str;
}

pub async fn make_transaction_feed(config: &FeedConfig) -> crate::Result<Arc<dyn TransactionFeed>> {
    let feed: Arc<dyn TransactionFeed> = match config.provider {
        FeedProvider::Ethplorer => Arc::new(EthplorerFeed::from_config(config).map_err(|e| err_with_loc!(e))?),
        FeedProvider::Replay => {
            let path = config
                .replay_path
                .as_ref()
                .ok_or_else(|| err_with_loc!("feed.replay_path is not set"))?;
            Arc::new(MemoryFeed::load_from_path(path, config.page_size).await?)
        },
    };
    info!("feed::created::{}", feed.name());
    Ok(feed)
}
