//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration is read once at process start. Resolution order for
//! every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never prevents startup: a warning is
//! logged and compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const ENV_CONFIG_PATH: &str = "LISTCAT_CONFIG";
/// Environment variable overriding the root (data) folder
pub const ENV_ROOT_FOLDER: &str = "LISTCAT_ROOT_FOLDER";
/// Environment variable overriding the sync interval in seconds
pub const ENV_SYNC_INTERVAL: &str = "LISTCAT_SYNC_INTERVAL_SECS";

/// Bootstrap configuration loaded from TOML
///
/// All fields are optional in the file; absent fields take compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Folder holding the catalog snapshot
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Synchronization settings
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Synchronization settings consumed by the sync engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between scheduled full syncs; also the staleness window
    pub interval_secs: u64,
    /// Static source references (user ids/urls or list ids/urls)
    pub sources: Vec<String>,
    /// List ids used when discovery yields nothing
    pub fallback_list_ids: Vec<String>,
    /// Resolve episode items through their parent series
    pub enrich_episodes_by_parent: bool,
    /// Page ceiling per layout mode when following "next" links
    pub max_pages: usize,
    /// Mandatory delay between sequential page fetches
    pub page_delay_ms: u64,
    /// Per-host request quota
    pub requests_per_second: u32,
    /// Lists scraped concurrently
    pub scrape_concurrency: usize,
    /// Metadata lookups in flight at once
    pub metadata_concurrency: usize,
    /// Metadata cache size above which unreferenced entries are evicted
    pub metadata_cache_capacity: usize,
    /// Base url of the list site
    pub base_url: String,
    /// Base url of the metadata service
    pub metadata_base_url: String,
    /// User-Agent sent upstream
    pub user_agent: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 12 * 60 * 60,
            sources: Vec::new(),
            fallback_list_ids: Vec::new(),
            enrich_episodes_by_parent: false,
            max_pages: 50,
            page_delay_ms: 750,
            requests_per_second: 2,
            scrape_concurrency: 3,
            metadata_concurrency: 8,
            metadata_cache_capacity: 50_000,
            base_url: "https://www.imdb.com".to_string(),
            metadata_base_url: "https://v3-cinemeta.strem.io".to_string(),
            user_agent: get_user_agent(),
            request_timeout_secs: 15,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Standard User-Agent for outbound HTTP clients
pub fn get_user_agent() -> String {
    format!("listcat/{} (+https://github.com/listcat/listcat)", env!("CARGO_PKG_VERSION"))
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/listcat (or /var/lib/listcat for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("listcat"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/listcat"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("listcat"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/listcat"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("listcat"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\listcat"))
    } else {
        PathBuf::from("./listcat_data")
    }
}

/// Default TOML location: `<config dir>/listcat/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("listcat").join("config.toml"))
}

/// Locate the TOML file: CLI → `LISTCAT_CONFIG` → platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load TOML config with graceful degradation
///
/// A missing file yields defaults silently; an unreadable or malformed file
/// yields defaults with a warning.
pub fn load_toml_config(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        return TomlConfig::default();
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return TomlConfig::default();
    }

    match read_toml_config(path) {
        Ok(config) => {
            info!("Loaded TOML configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution: CLI → `LISTCAT_ROOT_FOLDER` → TOML → compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Apply environment overrides to sync settings
///
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut SyncSettings) {
    if let Ok(value) = std::env::var(ENV_SYNC_INTERVAL) {
        match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => settings.interval_secs = secs,
            _ => warn!("Ignoring invalid {}={:?}", ENV_SYNC_INTERVAL, value),
        }
    }
}

/// Create the root folder if missing
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!("Created root folder: {}", root.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn test_sync_settings_defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.interval_secs, 43_200);
        assert_eq!(settings.max_pages, 50);
        assert!(settings.page_delay_ms > 0);
        assert!(!settings.enrich_episodes_by_parent);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [sync]
            interval_secs = 600
            sources = ["ur1234567"]
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.interval_secs, 600);
        assert_eq!(config.sync.sources, vec!["ur1234567".to_string()]);
        assert_eq!(config.sync.max_pages, 50);
        assert_eq!(config.logging.level, "info");
        assert!(config.root_folder.is_none());
    }

    #[test]
    fn test_user_agent_contains_version() {
        assert!(get_user_agent().contains(env!("CARGO_PKG_VERSION")));
    }
}
