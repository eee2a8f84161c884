//! listcat-sync library interface
//!
//! Mirrors user-curated list pages into a local catalog cache. Everything is
//! wired together once in [`CatalogContext`] and passed around explicitly.

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod services;
pub mod state;

pub use crate::error::{CatalogError, CatalogResult};

use crate::config::SyncConfig;
use crate::services::{
    CatalogService, HttpFetcher, HttpMetadataService, ListScraper, MetadataCache,
    MetadataResolver, MetadataService, PageFetcher, SnapshotStore, SourceDiscoverer,
    SyncOrchestrator, SyncScheduler,
};
use crate::state::CatalogState;
use listcat_common::events::EventBus;
use std::sync::Arc;
use tracing::{info, warn};

/// Engine components, constructed once at startup
#[derive(Clone)]
pub struct CatalogContext {
    pub config: Arc<SyncConfig>,
    pub state: Arc<CatalogState>,
    pub event_bus: EventBus,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub scheduler: SyncScheduler,
    pub catalog: CatalogService,
}

impl CatalogContext {
    /// Wire the engine over the given collaborators and restore the snapshot
    ///
    /// An unreadable snapshot is logged and the engine starts empty.
    pub async fn build(
        config: SyncConfig,
        fetcher: Arc<dyn PageFetcher>,
        metadata: Arc<dyn MetadataService>,
        event_bus: EventBus,
    ) -> Self {
        let config = Arc::new(config);
        let store = SnapshotStore::new(config.snapshot_path.clone());
        let cache = Arc::new(MetadataCache::new(config.metadata_cache_capacity));

        let state = match store.load().await {
            Ok(Some(snapshot)) => CatalogState::from_snapshot(snapshot, &cache),
            Ok(None) => {
                info!(path = %store.path().display(), "No snapshot yet, starting empty");
                CatalogState::new()
            }
            Err(e) => {
                warn!(error = %e, "Snapshot unreadable, starting empty");
                CatalogState::new()
            }
        };
        let state = Arc::new(state);

        let resolver = Arc::new(MetadataResolver::new(
            metadata,
            Arc::clone(&fetcher),
            cache,
            &config.base_url,
            config.enrich_episodes_by_parent,
        ));
        let discoverer = SourceDiscoverer::new(Arc::clone(&fetcher), &config.base_url, config.page_delay);
        let scraper = ListScraper::new(fetcher, config.max_pages, config.page_delay);

        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&state),
            discoverer,
            scraper,
            Arc::clone(&resolver),
            store.clone(),
            event_bus.clone(),
        ));
        let scheduler = SyncScheduler::new(
            Arc::clone(&orchestrator),
            Arc::clone(&state),
            config.sync_interval,
        );
        let catalog = CatalogService::new(
            Arc::clone(&state),
            resolver,
            scheduler.clone(),
            store,
            event_bus.clone(),
            config.metadata_concurrency,
        );

        Self {
            config,
            state,
            event_bus,
            orchestrator,
            scheduler,
            catalog,
        }
    }

    /// Wire the engine over the HTTP fetcher and metadata client
    pub async fn with_http(config: SyncConfig, event_bus: EventBus) -> CatalogResult<Self> {
        let fetcher = HttpFetcher::new(
            &config.user_agent,
            config.request_timeout,
            config.requests_per_second,
        )
        .map_err(|e| CatalogError::UpstreamUnavailable(e.to_string()))?;
        let metadata = HttpMetadataService::new(
            &config.metadata_base_url,
            &config.user_agent,
            config.request_timeout,
        )
        .map_err(|e| CatalogError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self::build(config, Arc::new(fetcher), Arc::new(metadata), event_bus).await)
    }
}
