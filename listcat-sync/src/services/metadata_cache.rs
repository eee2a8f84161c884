//! Metadata cache
//!
//! Owns resolved records and degraded fallbacks. Records are written once per
//! id and only leave the cache through an explicit purge or eviction.

use crate::models::{FallbackRecord, MetadataRecord};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use tracing::info;

#[derive(Default)]
struct CacheInner {
    records: HashMap<String, MetadataRecord>,
    fallbacks: HashMap<String, FallbackRecord>,
}

/// Bounded in-memory cache of metadata records
pub struct MetadataCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: &str) -> Option<MetadataRecord> {
        self.read().records.get(id).cloned()
    }

    pub fn fallback(&self, id: &str) -> Option<FallbackRecord> {
        self.read().fallbacks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().records.contains_key(id)
    }

    /// Store a record; an existing record for the id is kept
    ///
    /// Returns the record now cached for `id`.
    pub fn insert(
        &self,
        id: &str,
        record: MetadataRecord,
        fallback: Option<FallbackRecord>,
    ) -> MetadataRecord {
        let mut inner = self.write();
        if let Some(existing) = inner.records.get(id) {
            return existing.clone();
        }
        if let Some(fallback) = fallback {
            inner.fallbacks.insert(id.to_string(), fallback);
        }
        inner.records.insert(id.to_string(), record.clone());
        record
    }

    /// Forget an id so the next resolve fetches it again
    pub fn purge(&self, id: &str) -> bool {
        let mut inner = self.write();
        let had_fallback = inner.fallbacks.remove(id).is_some();
        inner.records.remove(id).is_some() || had_fallback
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered copies for the snapshot
    pub fn export(
        &self,
    ) -> (
        BTreeMap<String, MetadataRecord>,
        BTreeMap<String, FallbackRecord>,
    ) {
        let inner = self.read();
        (
            inner
                .records
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            inner
                .fallbacks
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Replace the cache contents from a snapshot
    pub fn restore(
        &self,
        records: BTreeMap<String, MetadataRecord>,
        fallbacks: BTreeMap<String, FallbackRecord>,
    ) {
        let mut inner = self.write();
        inner.records = records.into_iter().collect();
        inner.fallbacks = fallbacks.into_iter().collect();
    }

    /// Drop entries no committed list references, once over capacity
    ///
    /// Returns the number of records evicted.
    pub fn evict_unreferenced(&self, live: &HashSet<String>) -> usize {
        let mut inner = self.write();
        if inner.records.len() <= self.capacity {
            return 0;
        }
        let before = inner.records.len();
        inner.records.retain(|id, _| live.contains(id));
        inner.fallbacks.retain(|id, _| live.contains(id));
        let evicted = before - inner.records.len();
        info!(evicted, remaining = inner.records.len(), "Evicted unreferenced metadata");
        evicted
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
