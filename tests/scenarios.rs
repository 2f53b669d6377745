mod common;

use std::sync::Arc;

use darkblock::error::AnalysisError;
use darkblock::model::AnalysisOptions;
use darkblock::model::BlacklistEntry;
use darkblock::model::FactorKind;
use darkblock::model::RiskLevel;
use darkblock::pipeline::datasource::MemoryFeed;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use common::FailingFeed;
use common::address;
use common::assert_close;
use common::reconciles;
use common::record;
use common::session_with;

#[tokio::test]
async fn test_direct_counterparty_of_sanctioned_mixer() {
    let x = address(1);
    let y = address(2);
    let feed = MemoryFeed::from_records(vec![record(1, x, y, 1_000_000_000_000_000_000, 1_700_000_000)], 100).await;
    let session = session_with(Arc::new(feed));
    session.blacklist().upsert(BlacklistEntry::new(y, "mixer", "ofac", 0.9)).await.unwrap();

    let result = session
        .analyze(&x.to_string(), AnalysisOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_close(result.risk_score, 0.45);
    assert_eq!(result.risk_level, RiskLevel::Medium);
    assert_eq!(result.contributing_factors.len(), 1);
    let factor = &result.contributing_factors[0];
    assert_eq!(factor.kind, FactorKind::NeighborExposure { hops: 1 });
    assert_eq!(factor.address, y);
    assert_close(factor.raw_weight, 0.9);
    assert_close(factor.contribution, 0.45);

    assert_eq!(result.graph.nodes.len(), 2);
    assert_eq!(result.graph.edges.len(), 1);
    assert!(reconciles(&result.graph));
    assert!(!result.truncated);
    assert!(!result.incomplete);
}

#[tokio::test]
async fn test_clean_neighbourhood_is_low_risk() {
    let addresses: Vec<_> = (1..=5).map(address).collect();
    let records = addresses
        .windows(2)
        .enumerate()
        .map(|(i, pair)| record(i as u64 + 1, pair[0], pair[1], 50, 1_700_000_000 + i as u64 * 600))
        .collect();
    let session = session_with(Arc::new(MemoryFeed::from_records(records, 100).await));

    let options = AnalysisOptions {
        crawl_depth: 4,
        ..AnalysisOptions::default()
    };
    let result = session
        .analyze(&addresses[0].to_string(), options, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.risk_score, 0.0);
    assert_eq!(result.risk_level, RiskLevel::Low);
    assert!(result.contributing_factors.is_empty());
    // Root plus three hops, the fifth address is beyond max_depth
    assert_eq!(result.graph.nodes.len(), 4);
    assert!(result.truncated);
}

#[tokio::test]
async fn test_unreachable_feed_without_history() {
    let feed = Arc::new(FailingFeed::default());
    let session = session_with(feed.clone());

    let err = session
        .analyze(&address(1).to_string(), AnalysisOptions::default(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::UpstreamUnavailable(_)));
    assert_eq!(err.category(), "upstream");
    assert_eq!(feed.fetch_count(), 1);
    assert!(session.cache().is_empty().await);
}

#[tokio::test]
async fn test_large_fan_out_is_truncated() {
    let hub = address(1);
    let records = (2..=10_000u64)
        .map(|n| record(n, hub, address(n), 1_000 + n as u128, 1_700_000_000 + n))
        .collect();
    let feed = Arc::new(MemoryFeed::from_records(records, 1_000).await);
    let session = session_with(feed.clone());

    let options = AnalysisOptions {
        max_nodes: 500,
        ..AnalysisOptions::default()
    };
    let result = session.analyze(&hub.to_string(), options, CancellationToken::new()).await.unwrap();

    assert!(result.truncated);
    assert!(result.graph.nodes.len() <= 500);
    assert_eq!(result.graph.nodes[0].address, hub);
    assert_eq!(result.transactions_ingested, 9_999);
    assert_eq!(result.stats.counterparties, 9_999);
    assert_eq!(feed.fetch_count(), 10);

    // The heaviest counterparties are the ones kept
    let kept_min = result.graph.nodes[1..].iter().map(|node| node.total_in).min().unwrap();
    let dropped = session.graph().node(&address(2)).await.unwrap();
    assert!(dropped.total_in < kept_min);
}

#[tokio::test]
async fn test_exposure_decays_with_distance() {
    let x = address(1);
    let middle = address(2);
    let bad = address(3);
    let records = vec![record(1, x, middle, 100, 1_700_000_000), record(2, middle, bad, 100, 1_700_000_600)];
    let session = session_with(Arc::new(MemoryFeed::from_records(records, 100).await));
    session.blacklist().upsert(BlacklistEntry::new(bad, "exploit", "intel", 1.0)).await.unwrap();

    let options = AnalysisOptions {
        crawl_depth: 1,
        ..AnalysisOptions::default()
    };
    let result = session.analyze(&x.to_string(), options, CancellationToken::new()).await.unwrap();

    // x sends everything to middle, middle splits its flow between both sides
    assert_close(result.risk_score, 0.5 * 0.5 * 0.5);
    assert_eq!(result.risk_level, RiskLevel::Low);
    assert_eq!(result.contributing_factors[0].kind, FactorKind::NeighborExposure { hops: 2 });
}
