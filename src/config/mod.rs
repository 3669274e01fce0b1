mod file_config;

pub use file_config::{CatalogFileConfig, FileConfig, LlmFileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub tick_interval_secs: u64,
    pub manual_edit_cooldown_hours: i64,
    pub catalog_base_url: Option<String>,
    pub token_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub tick_interval_secs: u64,
    pub manual_edit_cooldown_hours: i64,

    // Collaborator settings
    pub catalog: CatalogSettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let tick_interval_secs = file.tick_interval_secs.unwrap_or(cli.tick_interval_secs);
        if tick_interval_secs == 0 {
            bail!("tick_interval_secs must be greater than zero");
        }

        let manual_edit_cooldown_hours = file
            .manual_edit_cooldown_hours
            .unwrap_or(cli.manual_edit_cooldown_hours);
        if manual_edit_cooldown_hours < 0 {
            bail!("manual_edit_cooldown_hours must not be negative");
        }

        let catalog_file = file.catalog.unwrap_or_default();
        let catalog = CatalogSettings {
            base_url: catalog_file
                .base_url
                .or_else(|| cli.catalog_base_url.clone())
                .unwrap_or_else(|| "https://api.spotify.com".to_string()),
            token_endpoint: catalog_file
                .token_endpoint
                .or_else(|| cli.token_endpoint.clone())
                .unwrap_or_else(|| "https://accounts.spotify.com/api/token".to_string()),
            client_id: catalog_file
                .client_id
                .or_else(|| cli.client_id.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "catalog client_id must be specified via --client-id or in config file"
                    )
                })?,
            client_secret: catalog_file
                .client_secret
                .or_else(|| cli.client_secret.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "catalog client_secret must be specified via --client-secret or in config file"
                    )
                })?,
        };

        let llm_file = file.llm.unwrap_or_default();
        let llm = LlmSettings {
            base_url: llm_file
                .base_url
                .or_else(|| cli.llm_base_url.clone())
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            model: llm_file
                .model
                .or_else(|| cli.llm_model.clone())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            api_key: llm_file.api_key.or_else(|| cli.llm_api_key.clone()),
        };

        Ok(Self {
            db_dir,
            tick_interval_secs,
            manual_edit_cooldown_hours,
            catalog,
            llm,
        })
    }

    pub fn playlist_db_path(&self) -> PathBuf {
        self.db_dir.join("playlists.db")
    }

    pub fn credentials_db_path(&self) -> PathBuf {
        self.db_dir.join("credentials.db")
    }
}
