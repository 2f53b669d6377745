mod common;

use std::sync::Arc;
use std::time::Duration;

use darkblock::error::AnalysisError;
use darkblock::model::AnalysisOptions;
use darkblock::model::BlacklistEntry;
use darkblock::pipeline::datasource::MemoryFeed;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use common::address;
use common::record;
use common::session_with;

async fn star_feed(
    hub: u64,
    spokes: u64,
) -> MemoryFeed {
    let records = (1..=spokes)
        .map(|n| record(hub * 1_000 + n, address(hub), address(hub * 1_000 + n), 10 * n as u128, 1_700_000_000 + n))
        .collect();
    MemoryFeed::from_records(records, 5).await
}

#[tokio::test(start_paused = true)]
async fn test_same_address_is_fetched_once() {
    let feed = Arc::new(star_feed(1, 12).await.with_latency(Duration::from_millis(200)));
    let session = session_with(feed.clone());
    let hub = address(1).to_string();

    let calls = (0..16).map(|_| {
        let session = session.clone();
        let hub = hub.clone();
        tokio::spawn(async move { session.analyze(&hub, AnalysisOptions::default(), CancellationToken::new()).await })
    });
    let results: Vec<_> = join_all(calls).await.into_iter().map(|joined| joined.unwrap().unwrap()).collect();

    // 12 records at 5 per page
    assert_eq!(feed.fetch_count(), 3);
    assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(results[0].transactions_ingested, 12);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_addresses_share_one_graph() {
    let feed = MemoryFeed::new(5).with_latency(Duration::from_millis(50));
    for hub in 1..=4u64 {
        for n in 1..=6u64 {
            feed.push_transfer(record(hub * 1_000 + n, address(hub), address(hub * 1_000 + n), 100, 1_700_000_000 + n))
                .await;
        }
    }
    let session = session_with(Arc::new(feed.clone()));
    session.blacklist().upsert(BlacklistEntry::new(address(3_001), "scam", "intel", 1.0)).await.unwrap();

    let calls = (1..=4u64).map(|hub| {
        let session = session.clone();
        async move {
            session
                .analyze(&address(hub).to_string(), AnalysisOptions::default(), CancellationToken::new())
                .await
        }
    });
    let results: Vec<_> = join_all(calls).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(session.graph().node_count().await, 4 * 7);
    assert_eq!(feed.fetch_count(), 4 * 2);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.queried_address, address(i as u64 + 1));
        assert_eq!(result.graph.nodes.len(), 7);
    }
    assert!(results[2].risk_score > 0.0);
    assert_eq!(results[0].risk_score, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_does_not_block_others() {
    let feed = Arc::new(star_feed(1, 4).await.with_latency(Duration::from_millis(500)));
    let session = session_with(feed.clone());
    let hub = address(1).to_string();

    let cancel = CancellationToken::new();
    let leader = {
        let session = session.clone();
        let hub = hub.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.analyze(&hub, AnalysisOptions::default(), cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let follower = {
        let session = session.clone();
        let hub = hub.clone();
        tokio::spawn(async move { session.analyze(&hub, AnalysisOptions::default(), CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let leader = leader.await.unwrap();
    assert!(matches!(leader, Err(AnalysisError::Cancelled(_))));

    let follower = follower.await.unwrap().unwrap();
    assert_eq!(follower.transactions_ingested, 4);
    assert!(!follower.incomplete);
}
