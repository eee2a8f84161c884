//! Shared catalog state
//!
//! The committed lists map, preferences and revision, plus the run gate and
//! the commit lock that serializes admin edits against the sync commit step.

use crate::models::{CatalogList, Preferences, Snapshot, SyncGate, SNAPSHOT_VERSION};
use crate::services::metadata_cache::MetadataCache;
use crate::services::revision::RevisionTracker;
use crate::services::snapshot_store::SnapshotStore;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

#[derive(Default)]
pub struct CatalogState {
    pub lists: RwLock<BTreeMap<String, CatalogList>>,
    pub preferences: RwLock<Preferences>,
    pub revision: RwLock<RevisionTracker>,
    pub last_sync: RwLock<Option<DateTime<Utc>>>,
    pub last_error: RwLock<Option<String>>,
    /// Held by admin edits and by the orchestrator's commit step
    pub commit_lock: Mutex<()>,
    pub gate: SyncGate,
}

impl CatalogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from a loaded snapshot; metadata goes into `cache`
    pub fn from_snapshot(snapshot: Snapshot, cache: &MetadataCache) -> Self {
        cache.restore(snapshot.metadata, snapshot.fallbacks);
        let preferences = snapshot.preferences.sanitize();
        let mut revision = RevisionTracker::restore(snapshot.revision, snapshot.fingerprint);
        // Snapshots written before fingerprints were stored get a baseline here
        revision.observe(&preferences);

        let mut lists = snapshot.lists;
        // Lists saved without a scraped base fall back to their committed items
        for list in lists.values_mut() {
            if list.scraped.is_empty() {
                list.scraped = list.items.clone();
            }
        }

        Self {
            lists: RwLock::new(lists),
            preferences: RwLock::new(preferences),
            revision: RwLock::new(revision),
            last_sync: RwLock::new(snapshot.last_sync),
            ..Self::default()
        }
    }

    /// Consistent copy of everything persisted
    pub async fn to_snapshot(&self, cache: &MetadataCache) -> Snapshot {
        let lists = self.lists.read().await.clone();
        let preferences = self.preferences.read().await.clone();
        let (revision, fingerprint) = {
            let tracker = self.revision.read().await;
            (tracker.revision(), tracker.fingerprint().map(str::to_string))
        };
        let (metadata, fallbacks) = cache.export();

        Snapshot {
            version: SNAPSHOT_VERSION,
            lists,
            preferences,
            metadata,
            fallbacks,
            revision,
            last_sync: *self.last_sync.read().await,
            fingerprint,
        }
    }

    /// Persist a snapshot; failures are logged and in-memory state stays authoritative
    pub async fn persist(&self, store: &SnapshotStore, cache: &MetadataCache) {
        let snapshot = self.to_snapshot(cache).await;
        if let Err(e) = store.save(&snapshot).await {
            warn!(path = %store.path().display(), error = %e, "Snapshot save failed");
        }
    }

    /// Every item id referenced by a committed list
    pub async fn live_item_ids(&self) -> HashSet<String> {
        self.lists
            .read()
            .await
            .values()
            .flat_map(|list| list.items.iter().cloned())
            .collect()
    }

    pub async fn revision(&self) -> u64 {
        self.revision.read().await.revision()
    }

    pub async fn set_last_error(&self, error: Option<String>) {
        *self.last_error.write().await = error;
    }
}
