use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// TOML file configuration. Every field is optional; values present here
/// override CLI arguments during resolution.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings
    pub db_dir: Option<String>,
    pub tick_interval_secs: Option<u64>,
    pub manual_edit_cooldown_hours: Option<i64>,

    // Collaborator endpoints
    pub catalog: Option<CatalogFileConfig>,
    pub llm: Option<LlmFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CatalogFileConfig {
    pub base_url: Option<String>,
    pub token_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LlmFileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }
}
