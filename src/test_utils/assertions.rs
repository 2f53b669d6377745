use crate::model::AnalysisResult;
use crate::model::GraphSnapshot;

const TOLERANCE: f64 = 1e-9;

#[track_caller]
pub fn assert_close(
    actual: f64,
    expected: f64,
) {
    assert!(
        (actual - expected).abs() <= TOLERANCE,
        "expected {} to be within {} of {}",
        actual,
        TOLERANCE,
        expected
    );
}

/// Every node's totals equal the sum of its edges, self-transfers on both sides.
#[track_caller]
pub fn assert_reconciled(snapshot: &GraphSnapshot) {
    for node in &snapshot.nodes {
        let out = snapshot
            .edges
            .iter()
            .filter(|edge| edge.from == node.address)
            .fold(alloy_primitives::U256::ZERO, |sum, edge| sum.saturating_add(edge.total_value));
        let inflow = snapshot
            .edges
            .iter()
            .filter(|edge| edge.to == node.address)
            .fold(alloy_primitives::U256::ZERO, |sum, edge| sum.saturating_add(edge.total_value));
        assert_eq!(out, node.total_out, "total_out of {} does not match its edges", node.address);
        assert_eq!(inflow, node.total_in, "total_in of {} does not match its edges", node.address);
    }
}

/// Scores are bounded and factors are ordered by contribution.
#[track_caller]
pub fn assert_well_formed(result: &AnalysisResult) {
    assert!((0.0..=1.0).contains(&result.risk_score), "score {} out of range", result.risk_score);
    for node in &result.graph.nodes {
        assert!((0.0..=1.0).contains(&node.risk_score), "node {} score out of range", node.address);
    }
    for pair in result.contributing_factors.windows(2) {
        assert!(
            pair[0].contribution >= pair[1].contribution,
            "factors out of order: {:?} before {:?}",
            pair[0],
            pair[1]
        );
    }
}
