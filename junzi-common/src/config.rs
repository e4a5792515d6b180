//! Configuration loading and root folder resolution
//!
//! Configuration is a single optional TOML file. A missing file is not an
//! error: the tooling logs a warning and runs on compiled defaults.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. `JUNZI_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Environment variable overriding the passage store root folder
pub const ROOT_FOLDER_ENV: &str = "JUNZI_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "JUNZI_CONFIG";

/// Boilerplate the scraper has been seen to capture in place of a translation
pub const DEFAULT_ARTIFACT_PATTERNS: &[&str] = &[
    "Enjoy this site? Please help",
    "Please help",
    "Site feedback",
    "ctext.org",
    "Log in",
    "Sign up",
    "Privacy policy",
    "Terms of service",
];

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Passage store root folder (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Author metadata for the catalog, keyed by work id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub catalog: BTreeMap<String, CatalogMeta>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
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

/// Thresholds and patterns shared by the validator, splitter and audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Case-insensitive substrings marking an `en` value as a scraping artifact
    #[serde(default = "default_artifact_patterns")]
    pub artifact_patterns: Vec<String>,

    /// Translations shorter than this (trimmed, in chars) count as bad in audits
    #[serde(default = "default_min_translation_chars")]
    pub min_translation_chars: usize,

    /// Share of CJK characters above which an `en` value is untranslated source
    #[serde(default = "default_max_cjk_ratio")]
    pub max_cjk_ratio: f64,

    /// Share of bad passages above which an audited chapter is flagged
    #[serde(default = "default_bad_chapter_ratio")]
    pub bad_chapter_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            artifact_patterns: default_artifact_patterns(),
            min_translation_chars: default_min_translation_chars(),
            max_cjk_ratio: default_max_cjk_ratio(),
            bad_chapter_ratio: default_bad_chapter_ratio(),
        }
    }
}

/// Catalog display metadata that is not part of the work document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeta {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_en: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_artifact_patterns() -> Vec<String> {
    DEFAULT_ARTIFACT_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_min_translation_chars() -> usize {
    10
}

fn default_max_cjk_ratio() -> f64 {
    0.3
}

fn default_bad_chapter_ratio() -> f64 {
    0.5
}

impl TomlConfig {
    /// Parse a config file; a missing file is an error here
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.check()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the config if present, otherwise warn and fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                info!("No config file located, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values no component can run with
    pub fn check(&self) -> Result<()> {
        let v = &self.validation;
        if !(0.0..=1.0).contains(&v.max_cjk_ratio) {
            return Err(Error::Config(format!(
                "validation.max_cjk_ratio must be within 0.0-1.0, got {}",
                v.max_cjk_ratio
            )));
        }
        if !(0.0..=1.0).contains(&v.bad_chapter_ratio) {
            return Err(Error::Config(format!(
                "validation.bad_chapter_ratio must be within 0.0-1.0, got {}",
                v.bad_chapter_ratio
            )));
        }
        if v.artifact_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Config(
                "validation.artifact_patterns must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the config file: explicit path, then `JUNZI_CONFIG`, then the
/// per-user config directory. Returns `None` when nothing applies.
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("junzi").join("config.toml"))
        .filter(|p| p.exists())
}

/// Resolves the passage store root folder
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_root: config.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!("Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_root {
            debug!("Root folder from config file: {}", path.display());
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("junzi"))
        .unwrap_or_else(|| PathBuf::from("./junzi_data"))
}

/// Write the config atomically (temp file, fsync, rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    {
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(content.as_bytes())?;
        tmp.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    info!("Config written to {}", path.display());
    Ok(())
}
