//! Sync orchestrator
//!
//! One run: discover list references, scrape each list, overlay local edits,
//! carry over lists missing from discovery, resolve metadata, then commit the
//! new lists map in one step and persist a snapshot.
//!
//! Everything before the commit step works on private copies. A failed run
//! never touches the committed lists map.

use crate::config::SyncConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogList, ListRef, Preferences, RunGuard};
use crate::services::list_scraper::{ListScrape, ListScraper};
use crate::services::metadata_resolver::MetadataResolver;
use crate::services::snapshot_store::SnapshotStore;
use crate::services::source_discoverer::SourceDiscoverer;
use crate::state::CatalogState;
use futures::stream::{self, StreamExt};
use listcat_common::events::{CatalogEvent, EventBus};
use listcat_common::time;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Run parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    /// Rediscover list references from sources; otherwise reuse committed refs
    pub full_discovery: bool,
}

impl SyncRequest {
    pub fn full() -> Self {
        Self {
            full_discovery: true,
        }
    }

    pub fn refresh() -> Self {
        Self {
            full_discovery: false,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed {
        run_id: Uuid,
        list_count: usize,
        item_count: usize,
        revision: u64,
        revision_changed: bool,
    },
    /// Another run was active; nothing was done
    Skipped,
    Failed {
        run_id: Uuid,
        error: String,
    },
}

impl SyncOutcome {
    /// Treat anything but a completed run as an error
    pub fn into_result(self) -> CatalogResult<Self> {
        match self {
            Self::Skipped => Err(CatalogError::ConcurrentSyncSkipped),
            Self::Failed { error, .. } => Err(CatalogError::Other(anyhow::anyhow!(error))),
            completed => Ok(completed),
        }
    }
}

/// Result of the commit step
struct CommitSummary {
    list_count: usize,
    item_count: usize,
    revision: u64,
    revision_changed: bool,
}

pub struct SyncOrchestrator {
    config: Arc<SyncConfig>,
    state: Arc<CatalogState>,
    discoverer: SourceDiscoverer,
    scraper: ListScraper,
    resolver: Arc<MetadataResolver>,
    store: SnapshotStore,
    events: EventBus,
}

impl SyncOrchestrator {
    pub fn new(
        config: Arc<SyncConfig>,
        state: Arc<CatalogState>,
        discoverer: SourceDiscoverer,
        scraper: ListScraper,
        resolver: Arc<MetadataResolver>,
        store: SnapshotStore,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            state,
            discoverer,
            scraper,
            resolver,
            store,
            events,
        }
    }

    /// Execute one run, or skip if another run is active
    pub async fn run(&self, request: SyncRequest) -> SyncOutcome {
        let Some(guard) = self.state.gate.try_begin() else {
            info!("Sync already running, trigger skipped");
            self.events.emit_lossy(CatalogEvent::SyncSkipped {
                timestamp: time::now(),
            });
            return SyncOutcome::Skipped;
        };

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(run_id = %run_id, full_discovery = request.full_discovery, "Sync started");
        self.events.emit_lossy(CatalogEvent::SyncStarted {
            run_id,
            full_discovery: request.full_discovery,
            timestamp: time::now(),
        });

        match self.execute(&guard, request).await {
            Ok(summary) => {
                guard.complete();
                self.state.set_last_error(None).await;

                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    run_id = %run_id,
                    lists = summary.list_count,
                    items = summary.item_count,
                    revision = summary.revision,
                    duration_ms,
                    "Sync completed"
                );
                self.events.emit_lossy(CatalogEvent::SyncCompleted {
                    run_id,
                    list_count: summary.list_count,
                    item_count: summary.item_count,
                    revision: summary.revision,
                    duration_ms,
                    timestamp: time::now(),
                });

                SyncOutcome::Completed {
                    run_id,
                    list_count: summary.list_count,
                    item_count: summary.item_count,
                    revision: summary.revision,
                    revision_changed: summary.revision_changed,
                }
            }
            Err(e) => {
                guard.fail();
                let message = e.to_string();
                error!(run_id = %run_id, error = %message, "Sync failed");
                self.state.set_last_error(Some(message.clone())).await;
                self.events.emit_lossy(CatalogEvent::SyncFailed {
                    run_id,
                    error: message.clone(),
                    timestamp: time::now(),
                });
                SyncOutcome::Failed {
                    run_id,
                    error: message,
                }
            }
        }
    }

    async fn execute(&self, guard: &RunGuard, request: SyncRequest) -> CatalogResult<CommitSummary> {
        let prefs = self.state.preferences.read().await.clone();
        let committed = self.state.lists.read().await.clone();

        // Steps 1-2: list references
        let refs = if request.full_discovery {
            self.discover(&prefs, &committed).await
        } else {
            committed.values().map(CatalogList::list_ref).collect()
        };
        debug!(lists = refs.len(), "List references ready");

        // Step 3: scrape
        let scraped = self.scrape_all(&refs).await;
        if !scraped.is_empty() && scraped.iter().all(|(_, scrape)| !scrape.reachable) {
            return Err(CatalogError::UpstreamUnavailable(format!(
                "none of {} lists could be fetched",
                scraped.len()
            )));
        }

        // Steps 3-4: overlay and carry-over, on a private copy
        let candidate = build_lists(&scraped, &committed, &prefs);

        // Step 5: metadata for every touched id
        let touched: Vec<String> = {
            let mut seen = HashSet::new();
            candidate
                .values()
                .flat_map(|list| list.items.iter())
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect()
        };
        self.resolver
            .resolve_many(&touched, self.config.metadata_concurrency)
            .await;

        // Steps 6-9
        if !guard.enter_commit() {
            return Err(CatalogError::Other(anyhow::anyhow!(
                "sync gate refused the commit transition"
            )));
        }
        Ok(self.commit(&scraped).await)
    }

    /// Discovery over preference and configured sources, fallback ids last
    async fn discover(
        &self,
        prefs: &Preferences,
        committed: &BTreeMap<String, CatalogList>,
    ) -> Vec<ListRef> {
        let known_names: HashMap<String, String> = committed
            .values()
            .filter(|list| list.name != list.url)
            .map(|list| (list.id.clone(), list.name.clone()))
            .collect();

        let mut references: Vec<String> = prefs.sources.clone();
        references.extend(self.config.sources.iter().cloned());
        references.extend(self.config.fallback_list_ids.iter().cloned());

        let mut refs: Vec<ListRef> = self
            .discoverer
            .discover_all(&references, &known_names)
            .await
            .into_iter()
            .filter(|r| !prefs.is_blocked(&r.id))
            .collect();

        if refs.is_empty() && !self.config.fallback_list_ids.is_empty() {
            warn!(
                fallback = self.config.fallback_list_ids.len(),
                "Discovery yielded nothing, using fallback list ids"
            );
            refs = self
                .config
                .fallback_list_ids
                .iter()
                .filter(|id| !prefs.is_blocked(id))
                .map(|id| {
                    let url = self.discoverer.list_url(id);
                    let name = known_names.get(id).cloned().unwrap_or_else(|| url.clone());
                    ListRef {
                        id: id.clone(),
                        url,
                        name,
                    }
                })
                .collect();
        }

        refs
    }

    /// Scrape lists concurrently, pagination within a list stays sequential
    async fn scrape_all(&self, refs: &[ListRef]) -> Vec<(ListRef, ListScrape)> {
        let mut scraped: Vec<(usize, ListRef, ListScrape)> = stream::iter(refs.iter().cloned().enumerate())
            .map(|(index, list_ref)| async move {
                let scrape = self.scraper.scrape_list(&list_ref.url).await;
                (index, list_ref, scrape)
            })
            .buffer_unordered(self.config.scrape_concurrency)
            .collect()
            .await;

        scraped.sort_by_key(|(index, _, _)| *index);
        scraped
            .into_iter()
            .map(|(_, list_ref, scrape)| (list_ref, scrape))
            .collect()
    }

    /// Replace the committed map, prune preferences, bump revision, persist
    async fn commit(&self, scraped: &[(ListRef, ListScrape)]) -> CommitSummary {
        let _commit = self.state.commit_lock.lock().await;

        // Edits may have landed while the run was scraping
        let prefs_now = self.state.preferences.read().await.clone();
        let current = self.state.lists.read().await.clone();

        let new_lists = build_lists(scraped, &current, &prefs_now);
        let list_count = new_lists.len();
        let item_count = new_lists.values().map(|l| l.items.len()).sum();
        let live_lists: HashSet<String> = new_lists.keys().cloned().collect();

        *self.state.lists.write().await = new_lists;

        let (old_revision, revision, revision_changed) = {
            let mut prefs = self.state.preferences.write().await;
            if prefs.prune_missing(&live_lists) {
                debug!("Pruned preferences of lists no longer present");
            }
            let mut tracker = self.state.revision.write().await;
            let old = tracker.revision();
            let changed = tracker.observe(&prefs);
            (old, tracker.revision(), changed)
        };
        if revision_changed {
            info!(old_revision, new_revision = revision, "Catalog revision changed");
            self.events.emit_lossy(CatalogEvent::RevisionChanged {
                old_revision,
                new_revision: revision,
                timestamp: time::now(),
            });
        }

        *self.state.last_sync.write().await = Some(time::now());
        let live_items = self.state.live_item_ids().await;
        self.resolver.cache().evict_unreferenced(&live_items);

        self.state.persist(&self.store, self.resolver.cache()).await;

        CommitSummary {
            list_count,
            item_count,
            revision,
            revision_changed,
        }
    }
}

/// Build the lists map from scrape results, local overlay and carry-over
///
/// A list whose scrape came back empty keeps its previously scraped items.
/// Previously committed lists absent from `scraped` are carried over unless
/// blocked. Either way the overlay is re-applied from `prefs` onto the scraped
/// base, so edits cleared since the last commit do not linger.
fn build_lists(
    scraped: &[(ListRef, ListScrape)],
    previous: &BTreeMap<String, CatalogList>,
    prefs: &Preferences,
) -> BTreeMap<String, CatalogList> {
    let mut lists = BTreeMap::new();

    for (list_ref, scrape) in scraped {
        if prefs.is_blocked(&list_ref.id) {
            continue;
        }
        let mut list = match previous.get(&list_ref.id) {
            Some(prior) if scrape.ids.is_empty() => {
                warn!(list_id = %list_ref.id, "Scrape returned nothing, keeping committed items");
                let mut kept = prior.rebase();
                kept.name = list_ref.name.clone();
                kept
            }
            _ => CatalogList::new(list_ref, scrape.ids.clone()),
        };
        list.apply_overlay(prefs.extras_for(&list.id), prefs.removed_for(&list.id));
        lists.insert(list.id.clone(), list);
    }

    for (id, prior) in previous {
        if lists.contains_key(id) || prefs.is_blocked(id) {
            continue;
        }
        debug!(list_id = %id, "Carrying over list absent from this run");
        let mut list = prior.rebase();
        list.apply_overlay(prefs.extras_for(id), prefs.removed_for(id));
        lists.insert(id.clone(), list);
    }

    lists
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_ref(id: &str) -> ListRef {
        ListRef {
            id: id.into(),
            url: format!("https://www.imdb.com/list/{}/", id),
            name: id.to_uppercase(),
        }
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn fetched(items: &[&str]) -> ListScrape {
        ListScrape {
            ids: ids(items),
            reachable: true,
        }
    }

    #[test]
    fn test_overlay_end_to_end() {
        let mut prefs = Preferences::default();
        prefs.extras.insert("ls100001".into(), ids(&["tt0000003"]));
        prefs.removed.insert("ls100001".into(), ids(&["tt0000002"]));

        let scraped = vec![(list_ref("ls100001"), fetched(&["tt0000001", "tt0000002"]))];
        let lists = build_lists(&scraped, &BTreeMap::new(), &prefs);
        assert_eq!(lists["ls100001"].items, ids(&["tt0000001", "tt0000003"]));
    }

    #[test]
    fn test_carry_over_skips_blocked() {
        let mut previous = BTreeMap::new();
        previous.insert(
            "ls100002".to_string(),
            CatalogList::new(&list_ref("ls100002"), ids(&["tt0000005"])),
        );
        previous.insert(
            "ls100003".to_string(),
            CatalogList::new(&list_ref("ls100003"), ids(&["tt0000006"])),
        );
        let prefs = Preferences {
            blocked: ids(&["ls100003"]),
            ..Preferences::default()
        };

        let scraped = vec![(list_ref("ls100001"), fetched(&["tt0000001"]))];
        let lists = build_lists(&scraped, &previous, &prefs);
        assert_eq!(
            lists.keys().cloned().collect::<Vec<_>>(),
            ids(&["ls100001", "ls100002"])
        );
    }

    #[test]
    fn test_empty_scrape_keeps_prior_items() {
        let mut previous = BTreeMap::new();
        previous.insert(
            "ls100001".to_string(),
            CatalogList::new(&list_ref("ls100001"), ids(&["tt0000001"])),
        );
        let scraped = vec![(list_ref("ls100001"), ListScrape::default())];
        let lists = build_lists(&scraped, &previous, &Preferences::default());
        assert_eq!(lists["ls100001"].items, ids(&["tt0000001"]));
    }

    #[test]
    fn test_cleared_extras_do_not_return_on_empty_scrape() {
        let mut prefs = Preferences::default();
        prefs.extras.insert("ls100001".into(), ids(&["tt0000009"]));
        let first = build_lists(
            &[(list_ref("ls100001"), fetched(&["tt0000001"]))],
            &BTreeMap::new(),
            &prefs,
        );
        assert_eq!(first["ls100001"].items, ids(&["tt0000001", "tt0000009"]));

        // Reset clears the extra, then the next scrape comes back empty
        prefs.extras.clear();
        let empty = vec![(list_ref("ls100001"), ListScrape::default())];
        let second = build_lists(&empty, &first, &prefs);
        assert_eq!(second["ls100001"].items, ids(&["tt0000001"]));

        // Carry-over rebuilds from the scraped base too
        let carried = build_lists(&[], &first, &prefs);
        assert_eq!(carried["ls100001"].items, ids(&["tt0000001"]));
    }

    #[test]
    fn test_carry_over_restores_unremoved_items() {
        let mut prefs = Preferences::default();
        prefs.removed.insert("ls100001".into(), ids(&["tt0000002"]));
        let first = build_lists(
            &[(list_ref("ls100001"), fetched(&["tt0000001", "tt0000002"]))],
            &BTreeMap::new(),
            &prefs,
        );
        assert_eq!(first["ls100001"].items, ids(&["tt0000001"]));

        prefs.removed.clear();
        let carried = build_lists(&[], &first, &prefs);
        assert_eq!(carried["ls100001"].items, ids(&["tt0000001", "tt0000002"]));
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(matches!(
            SyncOutcome::Skipped.into_result(),
            Err(CatalogError::ConcurrentSyncSkipped)
        ));
        let failed = SyncOutcome::Failed {
            run_id: Uuid::nil(),
            error: "none of 2 lists could be fetched".into(),
        };
        assert!(failed.into_result().is_err());
    }
}
