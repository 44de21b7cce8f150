use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::field::FieldDataType;

pub const CONFIG_FILE: &str = ".gh-board.toml";
pub const CACHE_FILE: &str = ".gh-board.cache.toml";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub board: Option<BoardConfig>,
    /// Logical field key (e.g. `priority`) to board field and value aliases.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMapping>,
    #[serde(default)]
    pub triage: BTreeMap<String, TriagePreset>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BoardConfig {
    /// Organization or user login that owns the project.
    pub owner: String,
    pub number: u64,
    /// `owner/name` of the repository whose issues are triaged.
    pub repo: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldMapping {
    /// Field name as shown on the board.
    pub field: String,
    /// Alias to option name.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TriagePreset {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub interactive: Vec<String>,
}

/// Config plus the file it was read from, if any.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    pub fn board(&self) -> Result<&BoardConfig> {
        self.config.board.as_ref().with_context(|| {
            format!("No [board] section configured. Add owner and number to {CONFIG_FILE}")
        })
    }

    /// The schema cache sits next to the config file.
    pub fn cache_path(&self) -> PathBuf {
        match self.path.as_ref().and_then(|p| p.parent()) {
            Some(dir) => dir.join(CACHE_FILE),
            None => global_dir().join(CACHE_FILE),
        }
    }
}

fn global_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gh-board")
}

/// First `.gh-board.toml` walking up from `start`.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let cwd = std::env::current_dir().unwrap_or_default();
    if let Some(path) = find_project_config(&cwd) {
        return Some(path);
    }
    let global = global_dir().join("config.toml");
    global.is_file().then_some(global)
}

pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = discover_config_path(explicit) else {
        tracing::debug!("no config file found, using defaults");
        return Ok(LoadedConfig::default());
    };
    let config = read_config(&path)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(LoadedConfig {
        config,
        path: Some(path),
    })
}

pub fn read_config(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Board field ids as last fetched, persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCacheFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: BTreeMap<String, CachedField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedField {
    pub id: String,
    pub data_type: FieldDataType,
    #[serde(default)]
    pub options: Vec<CachedOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedOption {
    pub name: String,
    pub id: String,
}

pub fn load_schema_cache(path: &Path) -> Result<Option<SchemaCacheFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema cache {}", path.display()))?;
    match toml::from_str(&contents) {
        Ok(cache) => Ok(Some(cache)),
        Err(e) => {
            // A stale or hand-edited cache is rebuilt from the board.
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable schema cache");
            Ok(None)
        }
    }
}

pub fn save_schema_cache(path: &Path, cache: &SchemaCacheFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(cache).context("Failed to serialize schema cache")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write schema cache {}", path.display()))?;
    Ok(())
}
