//! Catalog service
//!
//! Read path for the query layer plus the admin edit operations. Reads take
//! short read locks and never wait on a sync; a stale cache only schedules a
//! background run. Edits hold the commit lock so they never interleave with a
//! sync commit, and each one observes the revision and persists a snapshot.

use crate::error::{CatalogError, CatalogResult};
use crate::ids;
use crate::models::{Card, ListSummary, Preferences, SortKey, SyncPhase};
use crate::services::metadata_resolver::MetadataResolver;
use crate::services::ordering::sort_cards;
use crate::services::scheduler::SyncScheduler;
use crate::services::snapshot_store::SnapshotStore;
use crate::services::source_discoverer::SourceReference;
use crate::services::sync_orchestrator::{SyncOutcome, SyncRequest};
use crate::state::CatalogState;
use chrono::{DateTime, Utc};
use listcat_common::events::{CatalogEvent, EventBus};
use listcat_common::time;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Engine status for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStatus {
    pub phase: SyncPhase,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub revision: u64,
    pub list_count: usize,
    pub item_count: usize,
    pub metadata_count: usize,
}

#[derive(Clone)]
pub struct CatalogService {
    state: Arc<CatalogState>,
    resolver: Arc<MetadataResolver>,
    scheduler: SyncScheduler,
    store: SnapshotStore,
    events: EventBus,
    metadata_concurrency: usize,
}

impl CatalogService {
    pub fn new(
        state: Arc<CatalogState>,
        resolver: Arc<MetadataResolver>,
        scheduler: SyncScheduler,
        store: SnapshotStore,
        events: EventBus,
        metadata_concurrency: usize,
    ) -> Self {
        Self {
            state,
            resolver,
            scheduler,
            store,
            events,
            metadata_concurrency: metadata_concurrency.max(1),
        }
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Ordered cards of one list
    ///
    /// `sort` falls back to the list's default when absent or not allowed.
    pub async fn list_catalog(
        &self,
        list_id: &str,
        sort: Option<SortKey>,
    ) -> CatalogResult<Vec<Card>> {
        let list_id = ids::normalize_list_id(list_id)?;
        self.scheduler.trigger_if_stale().await;

        let items = {
            let lists = self.state.lists.read().await;
            lists
                .get(&list_id)
                .map(|list| list.items.clone())
                .ok_or_else(|| CatalogError::NotFound(list_id.clone()))?
        };
        let (key, custom_order) = {
            let prefs = self.state.preferences.read().await;
            (
                effective_sort(&prefs, &list_id, sort),
                prefs.custom_order_for(&list_id).to_vec(),
            )
        };

        let cache = self.resolver.cache();
        let cards = items
            .iter()
            .map(|id| Card::build(id, cache.get(id).as_ref(), cache.fallback(id).as_ref()))
            .collect();

        Ok(sort_cards(cards, key, &custom_order))
    }

    /// Card for one item; `None` when the id is unknown to the catalog
    pub async fn get_card(&self, item_id: &str) -> CatalogResult<Option<Card>> {
        let item_id = ids::normalize_item_id(item_id)?;
        self.scheduler.trigger_if_stale().await;

        let cache = self.resolver.cache();
        let record = cache.get(&item_id);
        let fallback = cache.fallback(&item_id);
        if record.is_none() && fallback.is_none() {
            let listed = self
                .state
                .lists
                .read()
                .await
                .values()
                .any(|list| list.items.contains(&item_id));
            if !listed {
                return Ok(None);
            }
        }

        Ok(Some(Card::build(&item_id, record.as_ref(), fallback.as_ref())))
    }

    /// Enabled lists in display order
    ///
    /// Lists named in `order` come first, then `enabled` order, then the rest
    /// by id.
    pub async fn lists(&self) -> Vec<ListSummary> {
        let lists = self.state.lists.read().await;
        let prefs = self.state.preferences.read().await;

        let mut seen = HashSet::new();
        prefs
            .order
            .iter()
            .chain(prefs.enabled.iter().flatten())
            .chain(lists.keys())
            .filter(|id| prefs.is_enabled(id) && !prefs.is_blocked(id))
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| lists.get(id.as_str()))
            .map(ListSummary::from)
            .collect()
    }

    pub async fn preferences(&self) -> Preferences {
        self.state.preferences.read().await.clone()
    }

    pub async fn revision(&self) -> u64 {
        self.state.revision().await
    }

    pub async fn status(&self) -> CatalogStatus {
        let (list_count, item_count) = {
            let lists = self.state.lists.read().await;
            (lists.len(), lists.values().map(|l| l.items.len()).sum())
        };
        CatalogStatus {
            phase: self.state.gate.phase(),
            last_sync: *self.state.last_sync.read().await,
            last_error: self.state.last_error.read().await.clone(),
            revision: self.state.revision().await,
            list_count,
            item_count,
            metadata_count: self.resolver.cache().len(),
        }
    }

    // ------------------------------------------------------------------
    // Admin edits
    // ------------------------------------------------------------------

    /// Force-include items in a list; returns how many were newly listed
    pub async fn add_items(&self, list_id: &str, item_ids: &[String]) -> CatalogResult<usize> {
        let list_id = ids::normalize_list_id(list_id)?;
        let item_ids = validated_items(item_ids)?;

        let added = {
            let _commit = self.state.commit_lock.lock().await;
            let added = {
                let mut lists = self.state.lists.write().await;
                let list = lists
                    .get_mut(&list_id)
                    .ok_or_else(|| CatalogError::NotFound(list_id.clone()))?;
                list.append_unique(&item_ids)
            };
            self.state
                .preferences
                .write()
                .await
                .add_extras(&list_id, &item_ids);
            self.finish_edit(Some(&list_id)).await;
            added
        };

        self.resolver
            .resolve_many(&item_ids, self.metadata_concurrency)
            .await;
        self.state.persist(&self.store, self.resolver.cache()).await;

        info!(list_id = %list_id, added, "Items added");
        Ok(added)
    }

    /// Force-exclude items from a list; returns how many were dropped
    pub async fn remove_items(&self, list_id: &str, item_ids: &[String]) -> CatalogResult<usize> {
        let list_id = ids::normalize_list_id(list_id)?;
        let item_ids = validated_items(item_ids)?;

        let _commit = self.state.commit_lock.lock().await;
        let removed = {
            let mut lists = self.state.lists.write().await;
            let list = lists
                .get_mut(&list_id)
                .ok_or_else(|| CatalogError::NotFound(list_id.clone()))?;
            list.remove_all(&item_ids)
        };
        self.state
            .preferences
            .write()
            .await
            .add_removals(&list_id, &item_ids);
        self.finish_edit(Some(&list_id)).await;

        info!(list_id = %list_id, removed, "Items removed");
        Ok(removed)
    }

    /// Pin an item order for a list; an empty sequence clears it
    pub async fn set_custom_order(&self, list_id: &str, item_ids: &[String]) -> CatalogResult<()> {
        let list_id = ids::normalize_list_id(list_id)?;
        let item_ids = validated_items(item_ids)?;

        let _commit = self.state.commit_lock.lock().await;
        {
            let mut prefs = self.state.preferences.write().await;
            if item_ids.is_empty() {
                prefs.custom_order.remove(&list_id);
            } else {
                prefs.custom_order.insert(list_id.clone(), item_ids);
            }
        }
        self.finish_edit(Some(&list_id)).await;
        Ok(())
    }

    /// Replace preferences wholesale after sanitizing them
    ///
    /// Newly blocked lists leave the committed map immediately.
    pub async fn set_preferences(&self, prefs: Preferences) -> CatalogResult<()> {
        let prefs = prefs.sanitize();

        let _commit = self.state.commit_lock.lock().await;
        {
            let mut lists = self.state.lists.write().await;
            lists.retain(|id, _| !prefs.is_blocked(id));
        }
        *self.state.preferences.write().await = prefs;
        self.finish_edit(None).await;
        Ok(())
    }

    /// Forget extras, removals and pinned order; the next sync re-derives items
    pub async fn reset_list_local_edits(&self, list_id: &str) -> CatalogResult<()> {
        let list_id = ids::normalize_list_id(list_id)?;

        let _commit = self.state.commit_lock.lock().await;
        self.state.preferences.write().await.reset_list(&list_id);
        self.finish_edit(Some(&list_id)).await;
        Ok(())
    }

    /// Block a list: it leaves the catalog and is skipped by every sync
    pub async fn block_list(&self, list_id: &str) -> CatalogResult<()> {
        let list_id = ids::normalize_list_id(list_id)?;

        let _commit = self.state.commit_lock.lock().await;
        self.state.lists.write().await.remove(&list_id);
        self.state.preferences.write().await.block(&list_id);
        self.finish_edit(Some(&list_id)).await;
        info!(list_id = %list_id, "List blocked");
        Ok(())
    }

    /// Unblock a list; it returns with the next full sync
    pub async fn unblock_list(&self, list_id: &str) -> CatalogResult<bool> {
        let list_id = ids::normalize_list_id(list_id)?;

        let _commit = self.state.commit_lock.lock().await;
        let unblocked = self.state.preferences.write().await.unblock(&list_id);
        if unblocked {
            self.finish_edit(Some(&list_id)).await;
            info!(list_id = %list_id, "List unblocked");
        }
        Ok(unblocked)
    }

    /// Add a source reference; returns false when already present
    pub async fn add_source(&self, reference: &str) -> CatalogResult<bool> {
        let reference = reference.trim();
        if let SourceReference::Unknown(raw) = SourceReference::parse(reference) {
            return Err(CatalogError::InvalidIdentifier(raw));
        }

        let _commit = self.state.commit_lock.lock().await;
        let added = {
            let mut prefs = self.state.preferences.write().await;
            if prefs.sources.iter().any(|s| s == reference) {
                false
            } else {
                prefs.sources.push(reference.to_string());
                true
            }
        };
        if added {
            self.finish_edit(None).await;
        }
        Ok(added)
    }

    /// Remove a source reference; returns false when it was not present
    pub async fn remove_source(&self, reference: &str) -> CatalogResult<bool> {
        let reference = reference.trim();

        let _commit = self.state.commit_lock.lock().await;
        let removed = {
            let mut prefs = self.state.preferences.write().await;
            let before = prefs.sources.len();
            prefs.sources.retain(|s| s != reference);
            before != prefs.sources.len()
        };
        if removed {
            self.finish_edit(None).await;
        }
        Ok(removed)
    }

    /// Drop a cached record so the next resolve fetches it again
    pub async fn purge_metadata(&self, item_id: &str) -> CatalogResult<bool> {
        let item_id = ids::normalize_item_id(item_id)?;
        let purged = self.resolver.cache().purge(&item_id);
        if purged {
            debug!(item_id = %item_id, "Metadata purged");
            self.state.persist(&self.store, self.resolver.cache()).await;
        }
        Ok(purged)
    }

    /// Start a sync in the background
    pub fn trigger_sync(&self, full_discovery: bool) -> JoinHandle<SyncOutcome> {
        self.scheduler.trigger(SyncRequest { full_discovery })
    }

    /// Run a sync and wait for its outcome
    pub async fn sync_now(&self, full_discovery: bool) -> SyncOutcome {
        match self.trigger_sync(full_discovery).await {
            Ok(outcome) => outcome,
            Err(e) => SyncOutcome::Failed {
                run_id: uuid::Uuid::nil(),
                error: format!("sync task aborted: {}", e),
            },
        }
    }

    /// Observe the revision, persist and announce an edit; caller holds the commit lock
    async fn finish_edit(&self, list_id: Option<&str>) {
        let (old_revision, new_revision, changed) = {
            let prefs = self.state.preferences.read().await;
            let mut tracker = self.state.revision.write().await;
            let old = tracker.revision();
            let changed = tracker.observe(&prefs);
            (old, tracker.revision(), changed)
        };
        if changed {
            self.events.emit_lossy(CatalogEvent::RevisionChanged {
                old_revision,
                new_revision,
                timestamp: time::now(),
            });
        }
        if let Some(list_id) = list_id {
            self.events.emit_lossy(CatalogEvent::ListEdited {
                list_id: list_id.to_string(),
                timestamp: time::now(),
            });
        }
        self.state.persist(&self.store, self.resolver.cache()).await;
    }
}

/// Requested key if allowed, else the list default, else native order
fn effective_sort(prefs: &Preferences, list_id: &str, requested: Option<SortKey>) -> SortKey {
    let default = prefs.sort.get(list_id).copied().unwrap_or(SortKey::Native);
    match requested {
        Some(key) => match prefs.sort_options.get(list_id) {
            Some(allowed) if !allowed.is_empty() && !allowed.contains(&key) => default,
            _ => key,
        },
        None => default,
    }
}

/// Normalize item ids, rejecting the whole request on any invalid id
fn validated_items(raw: &[String]) -> CatalogResult<Vec<String>> {
    let (accepted, rejected) = ids::partition_item_ids(raw);
    if !rejected.is_empty() {
        return Err(CatalogError::InvalidIdentifier(rejected.join(", ")));
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_sort() {
        let mut prefs = Preferences::default();
        assert_eq!(effective_sort(&prefs, "ls100001", None), SortKey::Native);
        assert_eq!(
            effective_sort(&prefs, "ls100001", Some(SortKey::NameAsc)),
            SortKey::NameAsc
        );

        prefs.sort.insert("ls100001".into(), SortKey::DateDesc);
        prefs
            .sort_options
            .insert("ls100001".into(), vec![SortKey::DateDesc, SortKey::RatingDesc]);
        assert_eq!(effective_sort(&prefs, "ls100001", None), SortKey::DateDesc);
        assert_eq!(
            effective_sort(&prefs, "ls100001", Some(SortKey::RatingDesc)),
            SortKey::RatingDesc
        );
        assert_eq!(
            effective_sort(&prefs, "ls100001", Some(SortKey::NameAsc)),
            SortKey::DateDesc
        );
    }

    #[test]
    fn test_validated_items() {
        let ok = validated_items(&["TT0000001".to_string(), "tt0000001".to_string()]).unwrap();
        assert_eq!(ok, vec!["tt0000001".to_string()]);
        assert!(matches!(
            validated_items(&["tt0000001".to_string(), "bad".to_string()]),
            Err(CatalogError::InvalidIdentifier(_))
        ));
    }
}
