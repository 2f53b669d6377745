use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::constants::BUILTIN_BLACKLIST;
use crate::constants::BUILTIN_BLACKLIST_SOURCE;
use crate::error::BlacklistError;
use crate::model::Address;
use crate::model::BlacklistEntry;
use crate::model::BlacklistUpdate;

/// Known-bad addresses, one entry per `(address, source)`.
///
/// Entries from different sources for the same address are kept side by side;
/// aggregating their confidences is left to the risk engine.
#[derive(Debug, Clone, Default)]
pub struct BlacklistIndex {
    entries: HashMap<Address, BTreeMap<String, BlacklistEntry>>,
}

impl BlacklistIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index preloaded with the addresses shipped in `constants`.
    pub fn with_builtin() -> Self {
        let mut index = Self::new();
        index.seed_builtin();
        index
    }

    /// All entries for `address`, ordered by source. Empty when clean.
    pub fn lookup(
        &self,
        address: &Address,
    ) -> Vec<BlacklistEntry> {
        self.entries
            .get(address)
            .map(|by_source| by_source.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Entries for every listed address that has at least one.
    pub fn lookup_many<'a, I>(
        &self,
        addresses: I,
    ) -> BTreeMap<Address, Vec<BlacklistEntry>>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        addresses
            .into_iter()
            .filter_map(|address| {
                let hits = self.lookup(address);
                (!hits.is_empty()).then_some((*address, hits))
            })
            .collect()
    }

    /// Insert or replace the entry of `entry.source` for `entry.address`.
    /// Entries with a confidence outside [0, 1] or no source are rejected.
    pub fn upsert(
        &mut self,
        entry: BlacklistEntry,
    ) -> Result<Option<BlacklistEntry>, BlacklistError> {
        entry.validate()?;
        Ok(self.entries.entry(entry.address).or_default().insert(entry.source.clone(), entry))
    }

    pub fn remove(
        &mut self,
        address: &Address,
        source: &str,
    ) -> Option<BlacklistEntry> {
        let by_source = self.entries.get_mut(address)?;
        let removed = by_source.remove(source);
        if by_source.is_empty() {
            self.entries.remove(address);
        }
        removed
    }

    /// Apply one feed message. Invalid upserts are logged and skipped;
    /// returns whether the update was taken.
    pub fn apply(
        &mut self,
        update: BlacklistUpdate,
    ) -> bool {
        match update {
            BlacklistUpdate::Upsert { entry } => {
                let (address, source) = (entry.address, entry.source.clone());
                match self.upsert(entry) {
                    Ok(_) => {
                        debug!("blacklist::upsert::{}::{}", address, source);
                        true
                    },
                    Err(e) => {
                        warn!("blacklist::upsert_skipped::{}::{}", address, e);
                        false
                    },
                }
            },
            BlacklistUpdate::Remove { address, source } => {
                debug!("blacklist::remove::{}::{}", address, source);
                self.remove(&address, &source);
                true
            },
        }
    }

    /// Every entry, ordered by address then source.
    pub fn entries(&self) -> Vec<BlacklistEntry> {
        let mut addresses: Vec<&Address> = self.entries.keys().collect();
        addresses.sort();
        addresses
            .into_iter()
            .filter_map(|address| self.entries.get(address))
            .flat_map(|by_source| by_source.values().cloned())
            .collect()
    }

    pub fn contains(
        &self,
        address: &Address,
    ) -> bool {
        self.entries.contains_key(address)
    }

    /// Number of listed addresses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn seed_builtin(&mut self) -> usize {
        let mut seeded = 0;
        for (raw, category) in BUILTIN_BLACKLIST {
            match raw.parse::<Address>() {
                Ok(address) => {
                    if self.upsert(BlacklistEntry::new(address, *category, BUILTIN_BLACKLIST_SOURCE, 1.0)).is_ok() {
                        seeded += 1;
                    }
                },
                Err(e) => warn!("blacklist::builtin::invalid_address::{}", e),
            }
        }
        seeded
    }

    /// Load a JSON array of entries. Malformed entries are logged and skipped;
    /// returns how many were upserted.
    pub fn load_from_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<usize, BlacklistError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let records: Vec<Value> = serde_json::from_str(&content)?;

        let mut loaded = 0;
        for record in &records {
            match BlacklistEntry::from_record(record) {
                Ok(entry) => match self.upsert(entry) {
                    Ok(_) => loaded += 1,
                    Err(e) => warn!("blacklist::load::skipped::{}", e),
                },
                Err(e) => warn!("blacklist::load::skipped::{}", e),
            }
        }

        info!("blacklist::load::{}::loaded::{}::of::{}", path.display(), loaded, records.len());
        Ok(loaded)
    }
}

// Thread-safe wrapper for the index
#[derive(Debug, Clone, Default)]
pub struct SharedBlacklistIndex {
    inner: Arc<RwLock<BlacklistIndex>>,
}

impl SharedBlacklistIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(
        &self,
        address: &Address,
    ) -> Vec<BlacklistEntry> {
        self.inner.read().await.lookup(address)
    }

    pub async fn lookup_many<'a, I>(
        &self,
        addresses: I,
    ) -> BTreeMap<Address, Vec<BlacklistEntry>>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        self.inner.read().await.lookup_many(addresses)
    }

    pub async fn upsert(
        &self,
        entry: BlacklistEntry,
    ) -> Result<Option<BlacklistEntry>, BlacklistError> {
        self.inner.write().await.upsert(entry)
    }

    pub async fn remove(
        &self,
        address: &Address,
        source: &str,
    ) -> Option<BlacklistEntry> {
        self.inner.write().await.remove(address, source)
    }

    pub async fn apply(
        &self,
        update: BlacklistUpdate,
    ) -> bool {
        self.inner.write().await.apply(update)
    }

    /// Apply a batch under one write lock, returning how many were taken.
    pub async fn apply_all(
        &self,
        updates: Vec<BlacklistUpdate>,
    ) -> usize {
        let mut index = self.inner.write().await;
        updates.into_iter().map(|update| index.apply(update)).filter(|applied| *applied).count()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl From<BlacklistIndex> for SharedBlacklistIndex {
    fn from(index: BlacklistIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::test_utils::fixtures::TestFixtures;

    #[test]
    fn test_sources_are_kept_distinct() {
        let bad = TestFixtures::address(7);
        let mut index = BlacklistIndex::new();
        index.upsert(BlacklistEntry::new(bad, "scam", "intel_b", 0.4)).unwrap();
        index.upsert(BlacklistEntry::new(bad, "mixer", "intel_a", 0.9)).unwrap();

        let hits = index.lookup(&bad);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "intel_a");
        assert_eq!(hits[1].source, "intel_b");
        assert_eq!(index.len(), 1);
        assert_eq!(index.entry_count(), 2);
    }

    #[test]
    fn test_upsert_replaces_same_source() {
        let bad = TestFixtures::address(7);
        let mut index = BlacklistIndex::new();
        assert!(index.upsert(BlacklistEntry::new(bad, "scam", "intel", 0.4)).unwrap().is_none());
        let previous = index.upsert(BlacklistEntry::new(bad, "phishing", "intel", 0.8)).unwrap().unwrap();

        assert_eq!(previous.confidence, 0.4);
        assert_eq!(index.lookup(&bad), vec![BlacklistEntry::new(bad, "phishing", "intel", 0.8)]);
    }

    #[rstest]
    #[case::confidence_above_one(BlacklistEntry::new(TestFixtures::address(7), "scam", "intel", 7.5))]
    #[case::negative_confidence(BlacklistEntry::new(TestFixtures::address(7), "scam", "intel", -0.1))]
    #[case::nan_confidence(BlacklistEntry::new(TestFixtures::address(7), "scam", "intel", f64::NAN))]
    #[case::empty_source(BlacklistEntry::new(TestFixtures::address(7), "scam", " ", 0.5))]
    fn test_invalid_entries_are_rejected(#[case] entry: BlacklistEntry) {
        let mut index = BlacklistIndex::new();
        assert!(matches!(index.upsert(entry.clone()), Err(BlacklistError::MalformedRecord(_))));
        assert!(!index.apply(BlacklistUpdate::Upsert { entry }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_only_drops_that_source() {
        let bad = TestFixtures::address(7);
        let mut index = BlacklistIndex::new();
        index.upsert(BlacklistEntry::new(bad, "scam", "a", 0.4)).unwrap();
        index.upsert(BlacklistEntry::new(bad, "scam", "b", 0.5)).unwrap();

        assert!(index.remove(&bad, "a").is_some());
        assert!(index.remove(&bad, "a").is_none());
        assert_eq!(index.lookup(&bad).len(), 1);

        assert!(index.apply(BlacklistUpdate::Remove {
            address: bad,
            source: "b".to_string(),
        }));
        assert!(index.lookup(&bad).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_lookup_many_returns_only_hits() {
        let clean = TestFixtures::address(1);
        let bad = TestFixtures::address(2);
        let mut index = BlacklistIndex::new();
        index.upsert(BlacklistEntry::new(bad, "scam", "intel", 0.4)).unwrap();

        let hits = index.lookup_many(&[clean, bad]);
        assert_eq!(hits.len(), 1);
        assert!(hits.contains_key(&bad));
    }

    #[test]
    fn test_builtin_seed() {
        let index = BlacklistIndex::with_builtin();
        assert_eq!(index.len(), BUILTIN_BLACKLIST.len());

        let tornado: Address = "0x722122dF12D4e14e13Ac3b6895a86e84145b6967".parse().unwrap();
        let hits = index.lookup(&tornado);
        assert_eq!(hits[0].category, "mixer");
        assert_eq!(hits[0].source, BUILTIN_BLACKLIST_SOURCE);
        assert_eq!(hits[0].confidence, 1.0);
    }

    #[test]
    fn test_load_from_path_skips_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"address": "0x00000000000000000000000000000000000000aa", "category": "scam", "source": "intel", "confidence": 0.7}},
                {{"address": "nope", "category": "scam", "source": "intel", "confidence": 0.7}},
                {{"address": "0x00000000000000000000000000000000000000bb", "category": "scam", "source": "intel", "confidence": 3.0}},
                {{"address": "0x00000000000000000000000000000000000000cc", "category": "hack", "source": "intel", "confidence": 1.0}}
            ]"#
        )
        .unwrap();

        let mut index = BlacklistIndex::new();
        let loaded = index.load_from_path(file.path()).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let mut index = BlacklistIndex::new();
        let err = index.load_from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, BlacklistError::ReadError(_)));
    }

    #[tokio::test]
    async fn test_shared_index_apply_all() {
        let shared = SharedBlacklistIndex::new();
        let bad = TestFixtures::address(3);
        let applied = shared
            .apply_all(vec![
                BlacklistUpdate::Upsert {
                    entry: BlacklistEntry::new(bad, "scam", "a", 0.2),
                },
                BlacklistUpdate::Upsert {
                    entry: BlacklistEntry::new(bad, "scam", "b", 0.3),
                },
                BlacklistUpdate::Upsert {
                    entry: BlacklistEntry::new(bad, "scam", "c", 1.5),
                },
            ])
            .await;

        assert_eq!(applied, 2);
        assert_eq!(shared.lookup(&bad).await.len(), 2);
        assert_eq!(shared.len().await, 1);
    }
}
