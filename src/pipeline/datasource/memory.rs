use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use tracing::warn;

use super::Cursor;
use super::FeedPage;
use super::TransactionFeed;
use crate::err_with_loc;
use crate::error::IngestError;
use crate::model::Address;

/// Feed served from records held in memory.
///
/// Records are kept per address in insertion order and paged by offset. A
/// replay file is either an object keyed by address or a flat array, in which
/// case each record is listed under both its sender and recipient.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    records: Arc<RwLock<HashMap<Address, Vec<Value>>>>,
    page_size: usize,
    latency: Option<Duration>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryFeed {
    pub fn new(page_size: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            page_size: page_size.max(1),
            latency: None,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay every fetch, as a remote provider would.
    pub fn with_latency(
        mut self,
        latency: Duration,
    ) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn from_records(
        records: Vec<Value>,
        page_size: usize,
    ) -> Self {
        let feed = Self::new(page_size);
        for record in records {
            feed.push_transfer(record).await;
        }
        feed
    }

    pub async fn load_from_path(
        path: impl AsRef<Path>,
        page_size: usize,
    ) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| err_with_loc!(format!("failed to read replay file {}: {}", path.display(), e)))?;
        let body: Value = serde_json::from_str(&content)
            .map_err(|e| err_with_loc!(format!("failed to parse replay file {}: {}", path.display(), e)))?;

        let feed = Self::new(page_size);
        match body {
            Value::Array(records) => {
                for record in records {
                    feed.push_transfer(record).await;
                }
            },
            Value::Object(by_address) => {
                for (raw, records) in by_address {
                    let address = match raw.parse::<Address>() {
                        Ok(address) => address,
                        Err(e) => {
                            warn!("replay::skipped_key::{}", e);
                            continue;
                        },
                    };
                    match records {
                        Value::Array(records) => feed.extend(address, records).await,
                        other => warn!("replay::skipped_value::{}::{}", address, other),
                    }
                }
            },
            other => return Err(err_with_loc!(format!("replay file must hold an array or object, got {}", other))),
        }

        info!("replay::loaded::{}::addresses::{}", path.display(), feed.address_count().await);
        Ok(feed)
    }

    pub async fn push(
        &self,
        address: Address,
        record: Value,
    ) {
        self.records.write().await.entry(address).or_default().push(record);
    }

    pub async fn extend(
        &self,
        address: Address,
        records: Vec<Value>,
    ) {
        self.records.write().await.entry(address).or_default().extend(records);
    }

    /// List a record under the sender and the recipient it names. Records
    /// without a parseable endpoint are still listed under the other one.
    pub async fn push_transfer(
        &self,
        record: Value,
    ) {
        let endpoint = |name: &str| record.get(name).and_then(Value::as_str).and_then(|s| s.parse::<Address>().ok());
        let from = endpoint("from");
        let to = endpoint("to");

        let mut records = self.records.write().await;
        if let Some(from) = from {
            records.entry(from).or_default().push(record.clone());
        }
        if let Some(to) = to.filter(|to| Some(*to) != from) {
            records.entry(to).or_default().push(record);
        }
    }

    pub async fn address_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionFeed for MemoryFeed {
    async fn fetch(
        &self,
        address: Address,
        cursor: Option<Cursor>,
    ) -> Result<FeedPage, IngestError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let offset = match &cursor {
            Some(cursor) => cursor
                .as_str()
                .parse::<usize>()
                .map_err(|_| IngestError::MalformedRecord(format!("invalid replay cursor {}", cursor)))?,
            None => 0,
        };

        let records = self.records.read().await;
        let all = records.get(&address).map(Vec::as_slice).unwrap_or_default();
        let end = offset.saturating_add(self.page_size).min(all.len());
        let page = all.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();
        let next_cursor = (end < all.len()).then(|| Cursor::new(end.to_string()));

        Ok(FeedPage {
            records: page,
            next_cursor,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::test_utils::fixtures::TestFixtures;

    #[tokio::test]
    async fn test_pages_by_offset() {
        let address = TestFixtures::address(1);
        let feed = MemoryFeed::new(2);
        feed.extend(address, vec![json!(1), json!(2), json!(3)]).await;

        let first = feed.fetch(address, None).await.unwrap();
        assert_eq!(first.records, vec![json!(1), json!(2)]);
        assert_eq!(first.next_cursor, Some(Cursor::new("2")));

        let second = feed.fetch(address, first.next_cursor).await.unwrap();
        assert_eq!(second.records, vec![json!(3)]);
        assert_eq!(second.next_cursor, None);

        let unknown = feed.fetch(TestFixtures::address(9), None).await.unwrap();
        assert!(unknown.records.is_empty());
        assert_eq!(feed.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_flat_replay_file_indexes_both_endpoints() {
        let a = TestFixtures::address(1);
        let b = TestFixtures::address(2);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = json!([TestFixtures::record(1, a, b, 10, 100)]);
        write!(file, "{}", body).unwrap();

        let feed = MemoryFeed::load_from_path(file.path(), 10).await.unwrap();
        assert_eq!(feed.address_count().await, 2);
        assert_eq!(feed.fetch(a, None).await.unwrap().records.len(), 1);
        assert_eq!(feed.fetch(b, None).await.unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn test_keyed_replay_file() {
        let a = TestFixtures::address(1);
        let b = TestFixtures::address(2);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = json!({
            a.to_string(): [TestFixtures::record(1, a, b, 10, 100), TestFixtures::record(2, b, a, 5, 200)],
            "garbage": []
        });
        write!(file, "{}", body).unwrap();

        let feed = MemoryFeed::load_from_path(file.path(), 10).await.unwrap();
        assert_eq!(feed.address_count().await, 1);
        assert_eq!(feed.fetch(a, None).await.unwrap().records.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_cursor_is_malformed() {
        let feed = MemoryFeed::new(2);
        let err = feed.fetch(TestFixtures::address(1), Some(Cursor::new("x"))).await.unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord(_)));
    }
}
