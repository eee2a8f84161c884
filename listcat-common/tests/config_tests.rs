//! Unit tests for configuration and graceful degradation
//!
//! Tests cover:
//! - Missing TOML files do not cause termination
//! - Malformed TOML falls back to defaults
//! - Priority order for root folder resolution
//! - Atomic TOML write-back
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.

use listcat_common::config::{
    apply_env_overrides, ensure_root_folder, load_toml_config, read_toml_config,
    resolve_config_path, resolve_root_folder, write_toml_config, get_default_root_folder, SyncSettings,
    TomlConfig, ENV_CONFIG_PATH, ENV_ROOT_FOLDER, ENV_SYNC_INTERVAL,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_default_root_folder_for_current_platform() {
    let root = get_default_root_folder();
    assert!(!root.as_os_str().is_empty());
    assert!(root.ends_with("listcat") || root.ends_with("listcat_data"));
}

#[test]
fn test_missing_toml_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(Some(&temp_dir.path().join("absent.toml")));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_no_path_returns_defaults() {
    assert_eq!(load_toml_config(None), TomlConfig::default());
}

#[test]
fn test_malformed_toml_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    assert!(read_toml_config(&path).is_err());
    assert_eq!(load_toml_config(Some(&path)), TomlConfig::default());
}

#[test]
fn test_write_then_read_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/listcat")),
        sync: SyncSettings {
            interval_secs: 900,
            sources: vec!["ur0012345".to_string(), "ls1000001".to_string()],
            fallback_list_ids: vec!["ls1000002".to_string()],
            enrich_episodes_by_parent: true,
            ..SyncSettings::default()
        },
        ..TomlConfig::default()
    };

    write_toml_config(&config, &path).unwrap();
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = read_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn test_root_folder_cli_wins() {
    env::set_var(ENV_ROOT_FOLDER, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/from-cli")), &toml);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));
    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    env::set_var(ENV_ROOT_FOLDER, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/from-env"));
    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_root_folder_toml_then_default() {
    env::remove_var(ENV_ROOT_FOLDER);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/from-toml"));

    assert_eq!(
        resolve_root_folder(None, &TomlConfig::default()),
        get_default_root_folder()
    );
}

#[test]
#[serial]
fn test_config_path_env_override() {
    env::set_var(ENV_CONFIG_PATH, "/tmp/listcat-test.toml");
    assert_eq!(
        resolve_config_path(None),
        Some(PathBuf::from("/tmp/listcat-test.toml"))
    );
    assert_eq!(
        resolve_config_path(Some(Path::new("/etc/listcat.toml"))),
        Some(PathBuf::from("/etc/listcat.toml"))
    );
    env::remove_var(ENV_CONFIG_PATH);
}

#[test]
#[serial]
fn test_sync_interval_env_override() {
    let mut settings = SyncSettings::default();

    env::set_var(ENV_SYNC_INTERVAL, "120");
    apply_env_overrides(&mut settings);
    assert_eq!(settings.interval_secs, 120);

    env::set_var(ENV_SYNC_INTERVAL, "not-a-number");
    apply_env_overrides(&mut settings);
    assert_eq!(settings.interval_secs, 120);

    env::remove_var(ENV_SYNC_INTERVAL);
}

#[test]
fn test_ensure_root_folder_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("a").join("b");
    ensure_root_folder(&root).unwrap();
    assert!(root.is_dir());
    // Idempotent
    ensure_root_folder(&root).unwrap();
}
