use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;

use crate::model::Address;
use crate::model::AnalysisResult;

#[derive(Debug, Clone)]
struct CachedResult {
    result: Arc<AnalysisResult>,
    stored_at: Instant,
}

/// Most recent result per address. The TTL is supplied on read so each
/// request can apply its own `cache_ttl_seconds`.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    inner: Arc<RwLock<HashMap<Address, CachedResult>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result younger than `ttl`. A zero TTL never hits.
    pub async fn get(
        &self,
        address: &Address,
        ttl: Duration,
    ) -> Option<Arc<AnalysisResult>> {
        if ttl.is_zero() {
            return None;
        }
        let entries = self.inner.read().await;
        let cached = entries.get(address)?;
        if cached.stored_at.elapsed() < ttl {
            trace!("cache::hit::{}", address);
            Some(cached.result.clone())
        } else {
            trace!("cache::expired::{}", address);
            None
        }
    }

    pub async fn insert(
        &self,
        result: Arc<AnalysisResult>,
    ) {
        let entry = CachedResult {
            stored_at: Instant::now(),
            result,
        };
        self.inner.write().await.insert(entry.result.queried_address, entry);
    }

    pub async fn invalidate(
        &self,
        address: &Address,
    ) -> bool {
        self.inner.write().await.remove(address).is_some()
    }

    /// Drop entries older than `ttl`, returning how many were removed.
    pub async fn purge_expired(
        &self,
        ttl: Duration,
    ) -> usize {
        let mut entries = self.inner.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.stored_at.elapsed() < ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
