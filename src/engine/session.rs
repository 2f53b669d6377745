use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::risk::RiskEngine;
use crate::error::AnalysisError;
use crate::error::IngestError;
use crate::model::Address;
use crate::model::AnalysisOptions;
use crate::model::AnalysisResult;
use crate::model::AnalysisStats;
use crate::model::Direction;
use crate::model::GraphSnapshot;
use crate::pipeline::TransactionIngestor;
use crate::storage::ResultCache;
use crate::storage::SharedBlacklistIndex;
use crate::storage::SharedFlowGraph;

type Outcome = Result<Arc<AnalysisResult>, AnalysisError>;
type InFlight = Arc<Mutex<HashMap<Address, watch::Receiver<Option<Outcome>>>>>;

enum Role {
    Leader(InFlightGuard),
    Follower(watch::Receiver<Option<Outcome>>),
}

/// Registration of the running analysis for an address. Dropping it without
/// `complete` (leader cancelled or panicked) releases the slot and wakes
/// every follower so one of them can take over.
struct InFlightGuard {
    in_flight: InFlight,
    address: Address,
    sender: watch::Sender<Option<Outcome>>,
}

impl InFlightGuard {
    fn complete(
        self,
        outcome: Outcome,
    ) {
        // No followers is fine
        let _ = self.sender.send(Some(outcome));
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let ours = in_flight
            .get(&self.address)
            .is_some_and(|receiver| receiver.same_channel(&self.sender.subscribe()));
        if ours {
            in_flight.remove(&self.address);
        }
    }
}

#[derive(Debug, Default)]
struct IngestOutcome {
    transactions: usize,
    capped: bool,
    failure: Option<IngestError>,
}

/// Entry point of an analysis: ingest, traverse, score, cache.
///
/// Graph, blacklist and cache are shared handles, so any number of sessions
/// (or clones of one) can work on the same state. Concurrent requests for
/// the same address are coalesced into one run.
#[derive(Clone)]
pub struct AnalysisSession {
    graph: SharedFlowGraph,
    blacklist: SharedBlacklistIndex,
    cache: ResultCache,
    ingestor: TransactionIngestor,
    engine: Arc<RiskEngine>,
    in_flight: InFlight,
}

impl AnalysisSession {
    pub fn new(
        graph: SharedFlowGraph,
        blacklist: SharedBlacklistIndex,
        cache: ResultCache,
        ingestor: TransactionIngestor,
        engine: RiskEngine,
    ) -> Self {
        Self {
            graph,
            blacklist,
            cache,
            ingestor,
            engine: Arc::new(engine),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn graph(&self) -> &SharedFlowGraph {
        &self.graph
    }

    pub fn blacklist(&self) -> &SharedBlacklistIndex {
        &self.blacklist
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Analyze `address`.
    ///
    /// A cached result younger than `cache_ttl_seconds` is returned as is.
    /// When another call is already analyzing the address this one waits for
    /// its outcome instead of starting a second run; if that run is
    /// cancelled, the waiters start over.
    pub async fn analyze(
        &self,
        address: &str,
        options: AnalysisOptions,
        cancel: CancellationToken,
    ) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let address: Address = address
            .parse()
            .map_err(|_| AnalysisError::InvalidAddress(address.to_string()))?;
        let ttl = Duration::from_secs(options.cache_ttl_seconds);

        loop {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled(format!("analysis of {} cancelled", address)));
            }

            if let Some(cached) = self.cache.get(&address, ttl).await {
                debug!("session::cache_hit::{}", address);
                return Ok(cached);
            }

            match self.join_or_lead(address) {
                Role::Leader(guard) => {
                    let outcome = self.run(address, options, &cancel).await;
                    guard.complete(outcome.clone());
                    return outcome;
                },
                Role::Follower(mut receiver) => {
                    debug!("session::joined_in_flight::{}", address);
                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(AnalysisError::Cancelled(format!("analysis of {} cancelled", address)));
                        },
                        outcome = receiver.wait_for(Option::is_some) => outcome.ok().and_then(|outcome| outcome.clone()),
                    };

                    match outcome {
                        Some(Ok(result)) => return Ok(result),
                        Some(Err(AnalysisError::Cancelled(_))) | None => {
                            debug!("session::leader_gone::retrying::{}", address);
                            continue;
                        },
                        Some(Err(e)) => return Err(e),
                    }
                },
            }
        }
    }

    fn join_or_lead(
        &self,
        address: Address,
    ) -> Role {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(receiver) = in_flight.get(&address) {
            return Role::Follower(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        in_flight.insert(address, receiver);
        Role::Leader(InFlightGuard {
            in_flight: self.in_flight.clone(),
            address,
            sender,
        })
    }

    #[instrument(level = "debug", skip_all, fields(address = %address))]
    async fn run(
        &self,
        address: Address,
        options: AnalysisOptions,
        cancel: &CancellationToken,
    ) -> Outcome {
        let started = Instant::now();
        info!(
            "session::analyze::{}::depth::{}::nodes::{}::crawl::{}",
            address, options.max_depth, options.max_nodes, options.crawl_depth
        );

        let ingest = self.ingest(address, &options, cancel).await?;
        if let Some(failure) = &ingest.failure {
            if ingest.transactions == 0 && !self.graph.contains_node(&address).await {
                warn!("session::upstream_unavailable::{}::{}", address, failure);
                return Err(AnalysisError::from(failure.clone()));
            }
        }
        let incomplete = ingest.failure.is_some();

        let mut subgraph = self
            .graph
            .subgraph(address, options.max_depth, options.max_nodes, cancel)
            .await?;
        let hits = self
            .blacklist
            .lookup_many(subgraph.depths.keys().chain(std::iter::once(&address)))
            .await;
        let assessment = self.engine.evaluate(&subgraph, &hits, cancel)?;

        self.graph.record_scores(&assessment.node_scores).await;
        subgraph.apply_scores(&assessment.node_scores);

        let counterparties = self.graph.neighbors(address, Direction::Both, usize::MAX).await.len();
        let stats = AnalysisStats::from_node(subgraph.node(&address), counterparties);
        let truncated = subgraph.truncated;

        let result = Arc::new(AnalysisResult {
            queried_address: address,
            risk_score: assessment.score,
            risk_level: assessment.level,
            contributing_factors: assessment.factors,
            graph: GraphSnapshot::from(subgraph),
            truncated,
            incomplete,
            transactions_ingested: ingest.transactions,
            stats,
            analyzed_at: Utc::now(),
        });

        if options.cache_ttl_seconds > 0 {
            self.cache.insert(result.clone()).await;
        }

        info!(
            "session::done::{}::score::{:.4}::level::{}::nodes::{}::truncated::{}::incomplete::{}::capped::{}::elapsed_ms::{}",
            address,
            result.risk_score,
            result.risk_level,
            result.graph.nodes.len(),
            truncated,
            incomplete,
            ingest.capped,
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Pull the history of `root`, then of its neighbors up to `crawl_depth`
    /// hops, all under one transaction cap. The first feed failure stops
    /// ingestion; what was committed before it stays in the graph.
    async fn ingest(
        &self,
        root: Address,
        options: &AnalysisOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome, AnalysisError> {
        let mut outcome = IngestOutcome::default();
        let mut visited = HashSet::from([root]);
        let mut frontier = vec![root];

        for hop in 0..=options.crawl_depth {
            let mut next = Vec::new();
            for address in frontier {
                let budget = options.transaction_cap.saturating_sub(outcome.transactions);
                if budget == 0 {
                    outcome.capped = true;
                    return Ok(outcome);
                }

                let taken = self.ingest_history(address, budget, cancel, &mut outcome).await?;
                outcome.transactions += taken;
                if outcome.failure.is_some() {
                    return Ok(outcome);
                }

                if hop < options.crawl_depth {
                    for neighbor in self.graph.neighbors(address, Direction::Both, usize::MAX).await {
                        if visited.insert(neighbor.address) {
                            next.push(neighbor.address);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            debug!("session::crawl::hop::{}::addresses::{}", hop + 1, next.len());
            frontier = next;
        }

        Ok(outcome)
    }

    async fn ingest_history(
        &self,
        address: Address,
        budget: usize,
        cancel: &CancellationToken,
        outcome: &mut IngestOutcome,
    ) -> Result<usize, AnalysisError> {
        let mut stream = self.ingestor.stream(address, None);
        let mut taken = 0;

        loop {
            let page = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AnalysisError::Cancelled(format!("ingestion of {} stopped after {} transactions", address, taken)));
                },
                page = stream.next_page() => page,
            };

            match page {
                None => {
                    if self.graph.mark_history_complete(&address).await {
                        trace!("session::history_complete::{}::{}", address, taken);
                    }
                    break;
                },
                Some(Ok(transactions)) => {
                    let take = transactions.len().min(budget - taken);
                    let fresh = self.graph.ingest_batch(&transactions[..take]).await;
                    taken += take;
                    debug!("session::ingested::{}::page::{}::new::{}", address, take, fresh);
                    if taken >= budget {
                        outcome.capped = true;
                        debug!("session::transaction_cap::{}::{}", address, budget);
                        break;
                    }
                },
                Some(Err(e)) => {
                    warn!(
                        "session::ingest_failed::{}::after::{}::cursor::{:?}::{}",
                        address,
                        taken,
                        stream.cursor(),
                        e
                    );
                    outcome.failure = Some(e);
                    break;
                },
            }
        }

        Ok(taken)
    }
}
