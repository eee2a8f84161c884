//! Test Helper Utilities
//!
//! Shared fixtures for listcat-sync integration tests

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::{list_page, named_page, FixtureFetcher, GatedFetcher, StubMetadataService};

use listcat_common::events::EventBus;
use listcat_sync::config::SyncConfig;
use listcat_sync::services::{MetadataService, PageFetcher};
use listcat_sync::CatalogContext;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const BASE: &str = "https://www.imdb.com";

/// Canonical list url
pub fn list_url(id: &str) -> String {
    format!("{}/list/{}/", BASE, id)
}

/// First page url of the detail layout
pub fn detail_url(id: &str) -> String {
    format!("{}/list/{}/?mode=detail", BASE, id)
}

/// Engine config pointed at `dir`, with no inter-page delay
pub fn test_config(dir: &Path, sources: &[&str]) -> SyncConfig {
    SyncConfig {
        sources: sources.iter().map(|s| s.to_string()).collect(),
        page_delay: Duration::ZERO,
        base_url: BASE.to_string(),
        snapshot_path: dir.join("catalog_snapshot.json"),
        ..SyncConfig::default()
    }
}

pub async fn build_context(
    config: SyncConfig,
    fetcher: &Arc<FixtureFetcher>,
    metadata: &Arc<StubMetadataService>,
) -> CatalogContext {
    let fetcher: Arc<dyn PageFetcher> = fetcher.clone();
    build_context_with(config, fetcher, metadata).await
}

/// Same as [`build_context`] over any page fetcher
pub async fn build_context_with(
    config: SyncConfig,
    fetcher: Arc<dyn PageFetcher>,
    metadata: &Arc<StubMetadataService>,
) -> CatalogContext {
    let metadata: Arc<dyn MetadataService> = metadata.clone();
    CatalogContext::build(config, fetcher, metadata, EventBus::new(100)).await
}

pub fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
