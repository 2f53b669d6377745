use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use serde_json::Value;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::risk::RiskEngine;
use super::session::AnalysisSession;
use crate::Result;
use crate::config::Config;
use crate::config::FeedProvider;
use crate::config::load_config;
use crate::err_with_loc;
use crate::handler::BlacklistFeedOperator;
use crate::handler::ShutdownSignal;
use crate::model::AnalysisOptions;
use crate::pipeline::RetryPolicy;
use crate::pipeline::TransactionIngestor;
use crate::pipeline::datasource::make_transaction_feed;
use crate::storage::BlacklistIndex;
use crate::storage::ResultCache;
use crate::storage::SharedBlacklistIndex;
use crate::storage::SharedFlowGraph;
use crate::tracing::setup_tracing;

const DEFAULT_CONFIG_PATH: &str = "Config.toml";

/// Score chain addresses and print the results as JSON.
#[derive(Debug, Clone, Parser)]
#[command(name = "mizan", version, about)]
pub struct MizanArgs {
    /// Addresses to analyze
    #[arg(required = true)]
    pub addresses: Vec<String>,

    /// Configuration file; defaults apply when the default path is absent
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serve transactions from a JSON replay file instead of the configured feed
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Extra blacklist seed files, merged after the configured one
    #[arg(long = "blacklist")]
    pub blacklists: Vec<PathBuf>,

    #[arg(long)]
    pub max_depth: Option<usize>,

    #[arg(long)]
    pub max_nodes: Option<usize>,

    #[arg(long)]
    pub crawl_depth: Option<usize>,

    #[arg(long)]
    pub pretty: bool,
}

impl MizanArgs {
    /// Fold the command-line overrides into the configuration, ahead of
    /// validation.
    pub fn apply_overrides(
        &self,
        config: &mut Config,
    ) {
        let options = &mut config.analyzer.options;
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        if let Some(max_nodes) = self.max_nodes {
            options.max_nodes = max_nodes;
        }
        if let Some(crawl_depth) = self.crawl_depth {
            options.crawl_depth = crawl_depth;
        }
        if let Some(replay) = &self.replay {
            config.feed.provider = FeedProvider::Replay;
            config.feed.replay_path = Some(replay.clone());
        }
    }
}

pub struct Mizan {
    pub config: Config,
    pub session: AnalysisSession,
}

impl Mizan {
    pub async fn run(args: MizanArgs) -> Result<()> {
        let shutdown_signal = ShutdownSignal::new();

        let config = Self::load(&args).await?;
        let _tracing_guards = setup_tracing("mizan", &config.logging)?;
        info!("Starting Mizan (ميزان): The Scale");

        let mizan = Self::build(config, &args.blacklists, shutdown_signal.clone()).await?;
        let options = mizan.config.analyzer.options;
        let cancellation_token = shutdown_signal.child_token();

        let ctrl_c_signal = shutdown_signal.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("main_loop::received_ctrl_c::cancelling_analyses");
                ctrl_c_signal.shutdown();
            }
        });

        let outcomes = mizan.analyze_all(&args.addresses, options, cancellation_token).await;
        let failed = outcomes.iter().filter(|outcome| outcome.get("error").is_some()).count();

        let output = Value::Array(outcomes);
        let rendered = if args.pretty {
            serde_json::to_string_pretty(&output)
        } else {
            serde_json::to_string(&output)
        }
        .map_err(|e| err_with_loc!(format!("failed to render results: {}", e)))?;
        println!("{}", rendered);

        if failed > 0 {
            return Err(err_with_loc!(format!("{} of {} analyses failed", failed, args.addresses.len())));
        }
        Ok(())
    }

    async fn load(args: &MizanArgs) -> Result<Config> {
        let mut config = match &args.config {
            Some(path) => load_config(path).await?,
            None if tokio::fs::try_exists(DEFAULT_CONFIG_PATH).await.unwrap_or(false) => {
                load_config(DEFAULT_CONFIG_PATH).await?
            },
            None => Config::default(),
        };

        args.apply_overrides(&mut config);
        config.validate().map_err(|e| err_with_loc!(e))?;
        Ok(config)
    }

    /// Wire feed, blacklist and session from the configuration.
    pub async fn build(
        config: Config,
        extra_blacklists: &[PathBuf],
        shutdown_signal: ShutdownSignal,
    ) -> Result<Self> {
        let feed = make_transaction_feed(&config.feed).await?;
        let ingestor = TransactionIngestor::new(feed, RetryPolicy::from(&config.feed));

        let blacklist = SharedBlacklistIndex::from(Self::seed_blacklist(&config)?);
        if !extra_blacklists.is_empty() {
            let (operator, handle) = BlacklistFeedOperator::spawn(blacklist.clone(), shutdown_signal, 8);
            for path in extra_blacklists {
                operator.reload(path.clone()).await?;
            }
            drop(operator);
            let applied = handle
                .await
                .map_err(|e| err_with_loc!(format!("blacklist feed handler failed: {}", e)))?;
            debug!("blacklist::extra_files::{}::applied::{}", extra_blacklists.len(), applied);
        }
        info!("blacklist::ready::addresses::{}", blacklist.len().await);

        let session = AnalysisSession::new(
            SharedFlowGraph::new(),
            blacklist,
            ResultCache::new(),
            ingestor,
            RiskEngine::new(config.risk.clone()),
        );

        Ok(Self { config, session })
    }

    fn seed_blacklist(config: &Config) -> Result<BlacklistIndex> {
        let mut index = BlacklistIndex::new();
        if config.blacklist.include_builtin {
            let seeded = index.seed_builtin();
            debug!("blacklist::builtin::{}", seeded);
        }
        if let Some(path) = &config.blacklist.seed_path {
            index.load_from_path(path).map_err(|e| err_with_loc!(e))?;
        }
        Ok(index)
    }

    /// Analyze every address with at most `max_concurrent_analyses` in
    /// flight. Outcomes keep the input order; failures become error objects.
    pub async fn analyze_all(
        &self,
        addresses: &[String],
        options: AnalysisOptions,
        cancellation_token: CancellationToken,
    ) -> Vec<Value> {
        let concurrency = self.config.analyzer.max_concurrent_analyses.max(1);

        let mut outcomes: Vec<(usize, Value)> = futures::stream::iter(addresses.iter().cloned().enumerate())
            .map(|(index, address)| {
                let session = self.session.clone();
                let token = cancellation_token.clone();
                async move {
                    let outcome = match session.analyze(&address, options, token).await {
                        Ok(result) => serde_json::to_value(Arc::as_ref(&result)).unwrap_or_else(|e| {
                            error!("mizan::serialize_failed::{}::{}", address, e);
                            json!({ "address": address, "error": e.to_string(), "category": "internal" })
                        }),
                        Err(e) => {
                            warn!("mizan::analysis_failed::{}::{}", address, e);
                            json!({ "address": address, "error": e.to_string(), "category": e.category() })
                        },
                    };
                    (index, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}
