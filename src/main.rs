use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunesmith::catalog::SpotifyCatalog;
use tunesmith::config::{AppConfig, CliConfig, FileConfig};
use tunesmith::credentials::SqliteCredentialStore;
use tunesmith::extraction::LlmConstraintExtractor;
use tunesmith::llm::OpenAiProvider;
use tunesmith::pipeline::SynthesisEngine;
use tunesmith::playlist::SqlitePlaylistStore;
use tunesmith::scheduler::RefreshScheduler;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the SQLite database files.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Seconds between scheduler passes over due playlists.
    #[clap(long, default_value_t = 60)]
    pub tick_interval_secs: u64,

    /// Hours a manual edit suppresses auto-refresh for.
    #[clap(long, default_value_t = 24)]
    pub cooldown_hours: i64,

    /// Base URL of the streaming catalog API.
    #[clap(long)]
    pub catalog_base_url: Option<String>,

    /// OAuth token endpoint used for credential refresh.
    #[clap(long)]
    pub token_endpoint: Option<String>,

    /// OAuth client id.
    #[clap(long)]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[clap(long)]
    pub client_secret: Option<String>,

    /// Base URL of the LLM completion API.
    #[clap(long)]
    pub llm_base_url: Option<String>,

    /// LLM model used for extraction, query generation and validation.
    #[clap(long)]
    pub llm_model: Option<String>,

    /// API key for the LLM endpoint, if it requires one.
    #[clap(long)]
    pub llm_api_key: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            tick_interval_secs: self.tick_interval_secs,
            manual_edit_cooldown_hours: self.cooldown_hours,
            catalog_base_url: self.catalog_base_url.clone(),
            token_endpoint: self.token_endpoint.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            llm_base_url: self.llm_base_url.clone(),
            llm_model: self.llm_model.clone(),
            llm_api_key: self.llm_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening playlist store at {:?}...", config.playlist_db_path());
    let playlist_store = Arc::new(SqlitePlaylistStore::new(&config.playlist_db_path())?);

    info!(
        "Opening credential store at {:?}...",
        config.credentials_db_path()
    );
    let credential_store = Arc::new(SqliteCredentialStore::new(
        &config.credentials_db_path(),
        config.catalog.token_endpoint.clone(),
        config.catalog.client_id.clone(),
        config.catalog.client_secret.clone(),
    )?);

    let llm = Arc::new(OpenAiProvider::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));
    let extraction = Arc::new(LlmConstraintExtractor::new(llm));
    let catalog = Arc::new(SpotifyCatalog::new(config.catalog.base_url.clone()));

    let engine = Arc::new(SynthesisEngine::new(
        extraction,
        catalog.clone(),
        credential_store.clone(),
        playlist_store.clone(),
    ));

    let scheduler = RefreshScheduler::new(
        playlist_store,
        credential_store,
        catalog,
        engine,
    )
    .with_cooldown(ChronoDuration::hours(config.manual_edit_cooldown_hours));

    info!(
        "Scheduler running, ticking every {}s",
        config.tick_interval_secs
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(config.tick_interval_secs));
    loop {
        ticker.tick().await;
        let report = scheduler.tick(Utc::now()).await;
        if !report.cycles.is_empty() {
            info!(
                committed = report.committed(),
                skipped = report.skipped(),
                failed = report.failed(),
                "Refresh cycle complete"
            );
        }
    }
}
