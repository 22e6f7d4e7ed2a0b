//! HTTP server assembly for Waypoint.
//!
//! Wires the API router under `/api/v1/tours`, adds `/health`, and owns the
//! [`ServerConfig`] read once at startup.

use std::path::{Path, PathBuf};

use axum::{Json, Router, routing::get};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use waypoint_api::{ApiState, api_router};
use waypoint_core::{
  entitlement::PurchaseEntitlement, lifecycle::LifecycleRules, store::TourStore,
  tracker::TrackerRules,
};
use waypoint_entitlement::PurchaseGateConfig;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `WAYPOINT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub purchase:   PurchaseGateConfig,
  pub execution:  TrackerRules,
  pub lifecycle:  LifecycleRules,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "0.0.0.0".into(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/waypoint/tours.db"),
      purchase:   PurchaseGateConfig::default(),
      execution:  TrackerRules::default(),
      lifecycle:  LifecycleRules::default(),
    }
  }
}

impl ServerConfig {
  /// Layer the optional file at `path` under the environment. Nested keys
  /// use `__`, e.g. `WAYPOINT_EXECUTION__ENTITLEMENT_POLICY=fail_closed`.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let config: Self = Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(
        Environment::with_prefix("WAYPOINT")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()?;

    config
      .execution
      .validate()
      .map_err(|e| ConfigError::Message(format!("execution: {e}")))?;
    Ok(config)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

async fn health() -> Json<Value> { Json(json!({ "status": "healthy" })) }

/// Build the full application router.
pub fn router<S, P>(state: ApiState<S, P>) -> Router
where
  S: TourStore + 'static,
  P: PurchaseEntitlement + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api/v1/tours", api_router(state))
    .layer(TraceLayer::new_for_http())
}
