use std::collections::HashSet;
use std::sync::Arc;

use alloy_primitives::B256;
use futures::Stream;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::datasource::Cursor;
use super::datasource::FeedPage;
use super::datasource::TransactionFeed;
use crate::config::FeedConfig;
use crate::constants::DEFAULT_BASE_RETRY_DELAY_MS;
use crate::constants::DEFAULT_MAX_RETRIES;
use crate::constants::DEFAULT_MAX_RETRY_DELAY_MS;
use crate::error::IngestError;
use crate::model::Address;
use crate::model::ParsedRecord;
use crate::model::Transaction;
use crate::utils::calculate_backoff_with_jitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    // Attempts after the first one
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_RETRY_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

impl From<&FeedConfig> for RetryPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_retry_delay_ms,
            max_delay_ms: config.max_retry_delay_ms,
        }
    }
}

/// Turns raw feed pages into normalized transactions.
#[derive(Clone)]
pub struct TransactionIngestor {
    feed: Arc<dyn TransactionFeed>,
    retry: RetryPolicy,
}

impl TransactionIngestor {
    pub fn new(
        feed: Arc<dyn TransactionFeed>,
        retry: RetryPolicy,
    ) -> Self {
        Self { feed, retry }
    }

    pub fn feed_name(&self) -> &'static str {
        self.feed.name()
    }

    /// Fetch and normalize one page.
    ///
    /// Malformed records are logged and skipped, reverted transactions are
    /// dropped. Only an unreachable feed fails the call, after the retry
    /// budget is spent.
    pub async fn fetch_transactions(
        &self,
        address: Address,
        cursor: Option<Cursor>,
    ) -> Result<(Vec<Transaction>, Option<Cursor>), IngestError> {
        let page = self.fetch_page_with_retry(address, cursor).await?;

        let mut transactions = Vec::with_capacity(page.records.len());
        for record in &page.records {
            match Transaction::from_record(record) {
                Ok(ParsedRecord::Transfer(tx)) => transactions.push(tx),
                Ok(ParsedRecord::Failed(hash)) => trace!("ingest::skipped_failed_tx::{}", hash),
                Err(e) => warn!("ingest::skipped_record::address::{}::{}", address, e),
            }
        }

        debug!(
            "ingest::page::address::{}::records::{}::transactions::{}::more::{}",
            address,
            page.records.len(),
            transactions.len(),
            page.next_cursor.is_some()
        );

        Ok((transactions, page.next_cursor))
    }

    /// Lazy page sequence for `address`, starting at `cursor` (or the first
    /// page).
    pub fn stream(
        &self,
        address: Address,
        cursor: Option<Cursor>,
    ) -> TransactionStream {
        TransactionStream {
            ingestor: self.clone(),
            address,
            cursor,
            seen: HashSet::new(),
            exhausted: false,
        }
    }

    async fn fetch_page_with_retry(
        &self,
        address: Address,
        cursor: Option<Cursor>,
    ) -> Result<FeedPage, IngestError> {
        let mut attempt = 0;
        loop {
            match self.feed.fetch(address, cursor.clone()).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let backoff_delay =
                        calculate_backoff_with_jitter(attempt, self.retry.base_delay_ms, self.retry.max_delay_ms);
                    attempt += 1;

                    debug!(
                        "retrying_feed_fetch_after_backoff::attempt::{}::delay_ms::{}::address::{}::error::{}",
                        attempt,
                        backoff_delay.as_millis(),
                        address,
                        e
                    );

                    tokio::time::sleep(backoff_delay).await;
                },
                Err(e) => {
                    error!(
                        "feed_fetch_failed::{}::address::{}::attempts::{}::error::{}",
                        self.feed.name(),
                        address,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                },
            }
        }
    }
}

/// Restartable cursor over the pages of one address.
///
/// Transactions already returned by an earlier page are filtered out, so a
/// feed that repeats records across page boundaries yields each hash once.
/// A failed page leaves the cursor untouched; calling `next_page` again
/// retries it.
pub struct TransactionStream {
    ingestor: TransactionIngestor,
    address: Address,
    cursor: Option<Cursor>,
    seen: HashSet<B256>,
    exhausted: bool,
}

impl TransactionStream {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Cursor of the next page to fetch; pass it to `stream` to resume.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// `None` once the feed reported its last page.
    pub async fn next_page(&mut self) -> Option<Result<Vec<Transaction>, IngestError>> {
        if self.exhausted {
            return None;
        }

        let (transactions, next_cursor) = match self.ingestor.fetch_transactions(self.address, self.cursor.clone()).await
        {
            Ok(page) => page,
            Err(e) => return Some(Err(e)),
        };

        let fresh: Vec<Transaction> = transactions.into_iter().filter(|tx| self.seen.insert(tx.hash)).collect();

        match next_cursor {
            Some(next) if Some(&next) == self.cursor.as_ref() => {
                warn!("ingest::cursor_did_not_advance::address::{}::cursor::{}", self.address, next);
                self.exhausted = true;
            },
            Some(next) => self.cursor = Some(next),
            None => self.exhausted = true,
        }

        Some(Ok(fresh))
    }

    pub fn into_stream(mut self) -> impl Stream<Item = Result<Vec<Transaction>, IngestError>> {
        async_stream::stream! {
            while let Some(page) = self.next_page().await {
                let failed = page.is_err();
                yield page;
                if failed {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::pipeline::datasource::MockTransactionFeed;
    use crate::test_utils::fixtures::TestFixtures;

    fn fast_retry(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 10,
            max_delay_ms: 100,
        }
    }

    fn page(
        records: Vec<serde_json::Value>,
        next: Option<&str>,
    ) -> FeedPage {
        FeedPage {
            records,
            next_cursor: next.map(Cursor::new),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let address = TestFixtures::address(1);
        let other = TestFixtures::address(2);
        let mut feed = MockTransactionFeed::new();
        let mut seq = Sequence::new();
        feed.expect_fetch()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(IngestError::UpstreamUnavailable("503".to_string())));
        feed.expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(page(vec![TestFixtures::record(1, address, other, 5, 10)], None)));
        feed.expect_name().return_const("mock");

        let ingestor = TransactionIngestor::new(Arc::new(feed), fast_retry(3));
        let (txs, next) = ingestor.fetch_transactions(address, None).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(next, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retry_budget() {
        let mut feed = MockTransactionFeed::new();
        feed.expect_fetch()
            .times(3)
            .returning(|_, _| Err(IngestError::UpstreamUnavailable("down".to_string())));
        feed.expect_name().return_const("mock");

        let ingestor = TransactionIngestor::new(Arc::new(feed), fast_retry(2));
        let err = ingestor.fetch_transactions(TestFixtures::address(1), None).await.unwrap_err();
        assert_eq!(err, IngestError::UpstreamUnavailable("down".to_string()));
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_records_are_skipped() {
        let address = TestFixtures::address(1);
        let other = TestFixtures::address(2);
        let mut feed = MockTransactionFeed::new();
        feed.expect_fetch().returning(move |_, _| {
            Ok(page(
                vec![
                    TestFixtures::record(1, address, other, 5, 10),
                    json!({"hash": "nonsense"}),
                    json!("not even an object"),
                    json!({
                        "hash": TestFixtures::tx_hash(2).to_string(),
                        "from": address.to_string(),
                        "to": other.to_string(),
                        "value": "7",
                        "timestamp": 11,
                        "success": false
                    }),
                    TestFixtures::record(3, other, address, 9, 12),
                ],
                None,
            ))
        });
        feed.expect_name().return_const("mock");

        let ingestor = TransactionIngestor::new(Arc::new(feed), fast_retry(0));
        let (txs, _) = ingestor.fetch_transactions(address, None).await.unwrap();
        let hashes: Vec<B256> = txs.iter().map(|tx| tx.hash).collect();
        assert_eq!(hashes, vec![TestFixtures::tx_hash(1), TestFixtures::tx_hash(3)]);
    }

    #[tokio::test]
    async fn test_stream_dedupes_across_pages_and_resumes() {
        let address = TestFixtures::address(1);
        let other = TestFixtures::address(2);
        let mut feed = MockTransactionFeed::new();
        feed.expect_fetch().with(eq(address), eq(None::<Cursor>)).returning(move |_, _| {
            Ok(page(
                vec![
                    TestFixtures::record(1, address, other, 1, 1),
                    TestFixtures::record(2, address, other, 1, 2),
                ],
                Some("p2"),
            ))
        });
        feed.expect_fetch().with(eq(address), eq(Some(Cursor::new("p2")))).returning(move |_, _| {
            Ok(page(
                vec![
                    TestFixtures::record(2, address, other, 1, 2),
                    TestFixtures::record(3, address, other, 1, 3),
                ],
                None,
            ))
        });
        feed.expect_name().return_const("mock");

        let ingestor = TransactionIngestor::new(Arc::new(feed), fast_retry(0));

        let mut stream = ingestor.stream(address, None);
        let first = stream.next_page().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(stream.cursor(), Some(&Cursor::new("p2")));

        let second = stream.next_page().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].hash, TestFixtures::tx_hash(3));
        assert!(stream.is_exhausted());
        assert!(stream.next_page().await.is_none());

        let resumed: Vec<_> = ingestor.stream(address, Some(Cursor::new("p2"))).into_stream().collect().await;
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_cursor() {
        let address = TestFixtures::address(1);
        let mut feed = MockTransactionFeed::new();
        feed.expect_fetch()
            .returning(|_, _| Err(IngestError::UpstreamUnavailable("down".to_string())));
        feed.expect_name().return_const("mock");

        let ingestor = TransactionIngestor::new(Arc::new(feed), fast_retry(0));
        let mut stream = ingestor.stream(address, Some(Cursor::new("p7")));
        assert!(stream.next_page().await.unwrap().is_err());
        assert_eq!(stream.cursor(), Some(&Cursor::new("p7")));
        assert!(!stream.is_exhausted());
    }

    #[tokio::test]
    async fn test_stalled_cursor_ends_stream() {
        let address = TestFixtures::address(1);
        let mut feed = MockTransactionFeed::new();
        feed.expect_fetch()
            .times(2)
            .returning(|_, _| Ok(page(Vec::new(), Some("same"))));
        feed.expect_name().return_const("mock");

        let ingestor = TransactionIngestor::new(Arc::new(feed), fast_retry(0));
        let pages: Vec<_> = ingestor.stream(address, None).into_stream().collect().await;
        assert_eq!(pages.len(), 2);
    }
}
