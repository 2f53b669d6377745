use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::Result;
use crate::err_with_loc;
use crate::handler::shutdown::ShutdownSignal;
use crate::model::BlacklistUpdate;
use crate::storage::BlacklistIndex;
use crate::storage::SharedBlacklistIndex;

pub enum BlacklistHandler {
    Update { update: BlacklistUpdate },
    Batch { updates: Vec<BlacklistUpdate> },
    // Merge a JSON seed file into the index
    Reload { path: PathBuf },
}

/// Actor applying blacklist feed messages to a shared index until shutdown
/// or until every sender is dropped.
pub struct BlacklistFeedHandler {
    receiver: mpsc::Receiver<BlacklistHandler>,
    index: SharedBlacklistIndex,
    shutdown: ShutdownSignal,
    applied: usize,
}

impl BlacklistFeedHandler {
    pub fn new(
        receiver: mpsc::Receiver<BlacklistHandler>,
        index: SharedBlacklistIndex,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            receiver,
            index,
            shutdown,
            applied: 0,
        }
    }

    async fn handle(
        &mut self,
        msg: BlacklistHandler,
    ) {
        match msg {
            BlacklistHandler::Update { update } => {
                if self.index.apply(update).await {
                    self.applied += 1;
                }
            },
            BlacklistHandler::Batch { updates } => {
                let received = updates.len();
                let count = self.index.apply_all(updates).await;
                self.applied += count;
                debug!("blacklist_feed::batch_applied::{}::of::{}", count, received);
            },
            BlacklistHandler::Reload { path } => {
                let path_for_load = path.clone();
                // File I/O off the runtime threads
                let loaded = tokio::task::spawn_blocking(move || {
                    let mut staged = BlacklistIndex::new();
                    staged.load_from_path(&path_for_load).map(|_| staged)
                })
                .await;

                match loaded {
                    Ok(Ok(staged)) => {
                        let updates: Vec<BlacklistUpdate> = staged
                            .entries()
                            .into_iter()
                            .map(|entry| BlacklistUpdate::Upsert { entry })
                            .collect();
                        let count = self.index.apply_all(updates).await;
                        self.applied += count;
                        info!("blacklist_feed::reloaded::{}::entries::{}", path.display(), count);
                    },
                    Ok(Err(e)) => error!("blacklist_feed::reload_failed::{}::error::{}", path.display(), e),
                    Err(e) => error!("blacklist_feed::reload_task_failed::{}::error::{}", path.display(), e),
                }
            },
        }
    }
}

async fn run_blacklist_feed_handler(mut handler: BlacklistFeedHandler) -> usize {
    debug!("blacklist_feed_handler::started");

    let shutdown = handler.shutdown.clone();
    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => {
                debug!("blacklist_feed_handler::shutdown");
                break;
            },
            msg = handler.receiver.recv() => match msg {
                Some(msg) => handler.handle(msg).await,
                None => {
                    debug!("blacklist_feed_handler::channel_closed::exiting");
                    break;
                },
            },
        }
    }

    info!("blacklist_feed_handler::stopped::applied::{}", handler.applied);
    handler.applied
}

/// Cloneable front of the feed handler.
#[derive(Debug, Clone)]
pub struct BlacklistFeedOperator {
    pub sender: mpsc::Sender<BlacklistHandler>,
    pub shutdown: ShutdownSignal,
}

impl BlacklistFeedOperator {
    /// Spawn the actor. The join handle yields how many updates were applied.
    pub fn spawn(
        index: SharedBlacklistIndex,
        shutdown: ShutdownSignal,
        capacity: usize,
    ) -> (Self, JoinHandle<usize>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handler = BlacklistFeedHandler::new(receiver, index, shutdown.clone());
        let handle = tokio::spawn(run_blacklist_feed_handler(handler));
        (Self { sender, shutdown }, handle)
    }

    pub async fn update(
        &self,
        update: BlacklistUpdate,
    ) -> Result<()> {
        self.send(BlacklistHandler::Update { update }).await
    }

    pub async fn batch(
        &self,
        updates: Vec<BlacklistUpdate>,
    ) -> Result<()> {
        self.send(BlacklistHandler::Batch { updates }).await
    }

    pub async fn reload(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<()> {
        self.send(BlacklistHandler::Reload { path: path.into() }).await
    }

    async fn send(
        &self,
        msg: BlacklistHandler,
    ) -> Result<()> {
        self.sender.send(msg).await.map_err(|e| {
            error!("blacklist_feed::send_failed::handler_stopped");
            err_with_loc!(format!("blacklist feed handler stopped: {}", e))
        })
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}
