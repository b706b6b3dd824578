//! Configuration resolution for labres.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/labres/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default timeout for fetching the machines wiki page.
pub const DEFAULT_IMPORT_TIMEOUT_SECS: u64 = 30;

/// Complete labres configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub importer: ImporterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the registry keeps its `SQLite` file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Wiki importer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Raw URL of the wiki page holding the machines table.
    pub url: Option<String>,
    /// Request timeout for the page fetch (seconds).
    pub timeout_secs: u64,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: DEFAULT_IMPORT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` is a config file named on the command line; unlike the global
/// file it must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    if let Some(path) = explicit {
        let file = load_config_file(path)?;
        merge_config(&mut config, file);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("labres").join("settings.json"))
}

/// Get the default registry database path.
pub fn database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("labres").join("registry.db"))
}

/// A config file as written on disk. Every key is optional so that a file
/// only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    database: DatabaseFile,
    importer: ImporterFile,
    logging: LoggingFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct DatabaseFile {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ImporterFile {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoggingFile {
    level: Option<String>,
    json: Option<bool>,
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: ConfigFile) {
    if let Some(path) = overlay.database.path {
        base.database.path = Some(path);
    }
    if let Some(url) = overlay.importer.url {
        base.importer.url = Some(url);
    }
    if let Some(secs) = overlay.importer.timeout_secs {
        base.importer.timeout_secs = secs;
    }
    if let Some(level) = overlay.logging.level {
        base.logging.level = level;
    }
    if let Some(json) = overlay.logging.json {
        base.logging.json = json;
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("LABRES_DB_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("LABRES_WIKI_URL") {
        config.importer.url = Some(val);
    }
    if let Some(val) = var("LABRES_IMPORT_TIMEOUT_SECS") {
        if let Ok(n) = val.parse() {
            config.importer.timeout_secs = n;
        }
    }
    if let Some(val) = var("LABRES_LOG_LEVEL") {
        config.logging.level = val;
    }
}
