//! waypoint-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `WAYPOINT_*` environment variables, opens the SQLite store, and serves the
//! tour API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use waypoint_api::ApiState;
use waypoint_entitlement::HttpPurchaseGate;
use waypoint_server::ServerConfig;
use waypoint_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Waypoint tour service")]
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

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let gate = HttpPurchaseGate::new(&server_cfg.purchase)
    .context("failed to build purchase service client")?;

  tracing::info!(
    purchase_service = %server_cfg.purchase.base_url,
    policy = ?server_cfg.execution.entitlement_policy,
    "purchase verification configured"
  );

  let state = ApiState::new(
    Arc::new(store),
    Arc::new(gate),
    server_cfg.lifecycle.clone(),
    server_cfg.execution.clone(),
  );
  let app = waypoint_server::router(state);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
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
