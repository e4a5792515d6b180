//! Configuration loading and root folder resolution
//!
//! Tests that touch JUNZI_ROOT_FOLDER or JUNZI_CONFIG are marked #[serial]
//! so they never race on the process environment.

use std::env;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::TempDir;

use junzi_common::config::{
    default_root_folder, locate_config_file, write_toml_config, CatalogMeta, RootFolderResolver,
    TomlConfig, CONFIG_PATH_ENV, ROOT_FOLDER_ENV,
};
use junzi_common::Error;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    assert_eq!(resolver.resolve(), default_root_folder());
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    let resolved = RootFolderResolver::new(None, &config).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_cli_beats_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");

    let resolved =
        RootFolderResolver::new(Some(PathBuf::from("/from/cli")), &TomlConfig::default()).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_toml_used_when_env_empty() {
    env::set_var(ROOT_FOLDER_ENV, "  ");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    let resolved = RootFolderResolver::new(None, &config).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_locate_config_prefers_explicit_path_then_env() {
    env::set_var(CONFIG_PATH_ENV, "/etc/junzi/env.toml");

    let explicit = PathBuf::from("/tmp/explicit.toml");
    assert_eq!(locate_config_file(Some(&explicit)), Some(explicit.clone()));
    assert_eq!(
        locate_config_file(None),
        Some(PathBuf::from("/etc/junzi/env.toml"))
    );

    env::remove_var(CONFIG_PATH_ENV);
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let config = TomlConfig::load_or_default(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(TomlConfig::load_or_default(None).unwrap(), TomlConfig::default());
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging\nlevel = ").unwrap();

    assert!(matches!(TomlConfig::load(&path), Err(Error::Toml(_))));
}

#[test]
fn test_out_of_range_threshold_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[validation]\nmax_cjk_ratio = 2.0\n").unwrap();

    assert!(matches!(TomlConfig::load(&path), Err(Error::Config(_))));
}

#[test]
fn test_write_then_load_preserves_catalog_meta() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/junzi")),
        ..Default::default()
    };
    config.logging.level = "debug".to_string();
    config.catalog.insert(
        "mengzi".to_string(),
        CatalogMeta {
            author: "孟子".to_string(),
            author_en: "Mencius".to_string(),
        },
    );

    write_toml_config(&config, &path).unwrap();
    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(!dir.path().join("nested").join("config.toml.tmp").exists());
}
