//! scholarmap-agent server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `SCHOLARMAP_*` environment variables, opens an in-process SQLite store and
//! serves the ingestion API over HTTP.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context as _, bail};
use clap::Parser;
use scholarmap_agent::{
  AppState, ServerConfig, fetch::HttpFetcher, gemini::GeminiExtractor,
};
use scholarmap_core::pipeline::IngestPipeline;
use scholarmap_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "ScholarMap ingestion agent")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SCHOLARMAP"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.agent_secret.trim().is_empty() {
    bail!("agent_secret must not be empty");
  }
  if server_cfg.gemini_api_key.trim().is_empty() {
    bail!("gemini_api_key must not be empty");
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let fetcher = HttpFetcher::new(
    Duration::from_secs(server_cfg.fetch_timeout_secs),
    &server_cfg.user_agent,
  )
  .context("failed to build page fetcher")?;

  let extractor = GeminiExtractor::new(server_cfg.gemini_api_key.clone())
    .context("failed to build model client")?
    .with_model(server_cfg.gemini_model.clone())
    .with_base_url(server_cfg.gemini_base_url.clone());

  let pipeline = IngestPipeline::new(fetcher, extractor, store);
  let app = scholarmap_agent::router(AppState::new(
    pipeline,
    &server_cfg.agent_secret,
  ));

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!(model = %server_cfg.gemini_model, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
