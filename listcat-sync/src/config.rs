//! Runtime configuration for listcat-sync
//!
//! Turns the bootstrap `TomlConfig` (after CLI and environment overrides) into
//! the typed settings the engine components consume.

use crate::ids;
use listcat_common::config::{SyncSettings, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// File name of the catalog snapshot inside the root folder
pub const SNAPSHOT_FILE_NAME: &str = "catalog_snapshot.json";

/// Engine configuration, constructed once at startup
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Scheduler cadence and staleness window
    pub sync_interval: Duration,
    /// Static source references from configuration
    pub sources: Vec<String>,
    /// Validated, normalized fallback list ids
    pub fallback_list_ids: Vec<String>,
    pub enrich_episodes_by_parent: bool,
    pub max_pages: usize,
    pub page_delay: Duration,
    pub requests_per_second: u32,
    pub scrape_concurrency: usize,
    pub metadata_concurrency: usize,
    pub metadata_cache_capacity: usize,
    pub base_url: String,
    pub metadata_base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Snapshot location
    pub snapshot_path: PathBuf,
}

impl SyncConfig {
    /// Build from resolved sync settings and the root folder
    ///
    /// Invalid fallback list ids are dropped with a warning.
    pub fn from_settings(settings: &SyncSettings, root_folder: PathBuf) -> Self {
        let fallback_list_ids = settings
            .fallback_list_ids
            .iter()
            .filter_map(|raw| match ids::normalize_list_id(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(value = %raw, "Ignoring invalid fallback list id");
                    None
                }
            })
            .collect();

        Self {
            sync_interval: Duration::from_secs(settings.interval_secs.max(1)),
            sources: settings.sources.clone(),
            fallback_list_ids,
            enrich_episodes_by_parent: settings.enrich_episodes_by_parent,
            max_pages: settings.max_pages.max(1),
            page_delay: Duration::from_millis(settings.page_delay_ms),
            requests_per_second: settings.requests_per_second.max(1),
            scrape_concurrency: settings.scrape_concurrency.max(1),
            metadata_concurrency: settings.metadata_concurrency.max(1),
            metadata_cache_capacity: settings.metadata_cache_capacity,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            metadata_base_url: settings.metadata_base_url.trim_end_matches('/').to_string(),
            user_agent: settings.user_agent.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs.max(1)),
            snapshot_path: root_folder.join(SNAPSHOT_FILE_NAME),
        }
    }

    /// Build from a full bootstrap config
    pub fn from_toml(toml: &TomlConfig, root_folder: PathBuf) -> Self {
        Self::from_settings(&toml.sync, root_folder)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default(), PathBuf::from("."))
    }
}
