//! Application configuration for linkboard.
//!
//! User config lives at `~/.linkboard/linkboard.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LinkboardError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "linkboard.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".linkboard";

/// Default database file name inside the config directory.
const DB_FILE_NAME: &str = "linkboard.db";

// ---------------------------------------------------------------------------
// Config structs (matching linkboard.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Feed importer settings.
    #[serde(default)]
    pub importer: ImporterConfig,

    /// Classifier pool settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. A leading `~/` expands to the
    /// user's home directory.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    format!("~/{CONFIG_DIR_NAME}/{DB_FILE_NAME}")
}

/// `[importer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// Subreddits to import from.
    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,

    /// Stack Overflow tags to import questions for.
    #[serde(default = "default_stack_tags")]
    pub stack_tags: Vec<String>,

    /// Number of Stack Overflow questions fetched per tag query.
    #[serde(default = "default_stack_page_size")]
    pub stack_page_size: u32,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            subreddits: default_subreddits(),
            stack_tags: default_stack_tags(),
            stack_page_size: default_stack_page_size(),
        }
    }
}

fn default_subreddits() -> Vec<String> {
    vec!["programming".into(), "golang".into(), "postgresql".into()]
}
fn default_stack_tags() -> Vec<String> {
    vec!["golang".into(), "postgresql".into(), "ruby".into()]
}
fn default_stack_page_size() -> u32 {
    5
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Number of concurrent classify workers.
    #[serde(default = "default_classifier_concurrency")]
    pub concurrency: u32,

    /// Posts fetched per page while feeding the worker pool.
    #[serde(default = "default_classifier_page_size")]
    pub page_size: u32,

    /// Timeout in seconds for fetching a linked page.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            concurrency: default_classifier_concurrency(),
            page_size: default_classifier_page_size(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_classifier_concurrency() -> u32 {
    10
}
fn default_classifier_page_size() -> u32 {
    100
}
fn default_fetch_timeout_secs() -> u64 {
    3
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.linkboard/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LinkboardError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.linkboard/linkboard.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LinkboardError::config(format!("cannot read {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| LinkboardError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| LinkboardError::config(format!("cannot create {}: {e}", dir.display())))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LinkboardError::config(e.to_string()))?;

    std::fs::write(&path, content)
        .map_err(|e| LinkboardError::config(format!("cannot write {}: {e}", path.display())))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the configured database path, expanding a leading `~/`.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.database.path;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| LinkboardError::config("could not determine home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("linkboard.db"));
        assert!(toml_str.contains("subreddits"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.classifier.concurrency, 10);
        assert_eq!(parsed.classifier.page_size, 100);
        assert_eq!(parsed.importer.subreddits.len(), 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[database]
path = "/tmp/test.db"

[classifier]
concurrency = 4
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.classifier.concurrency, 4);
        // Untouched fields keep defaults
        assert_eq!(config.classifier.fetch_timeout_secs, 3);
        assert_eq!(config.importer.stack_page_size, 5);
    }

    #[test]
    fn db_path_tilde_expansion() {
        let config = AppConfig::default();
        let path = resolve_db_path(&config).expect("resolve");
        assert!(path.is_absolute());
        assert!(path.ends_with(".linkboard/linkboard.db"));
    }

    #[test]
    fn db_path_absolute_passthrough() {
        let mut config = AppConfig::default();
        config.database.path = "/var/lib/linkboard.db".into();
        let path = resolve_db_path(&config).expect("resolve");
        assert_eq!(path, PathBuf::from("/var/lib/linkboard.db"));
    }
}
