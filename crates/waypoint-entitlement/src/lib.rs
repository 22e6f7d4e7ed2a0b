//! HTTP implementation of [`PurchaseEntitlement`].
//!
//! Asks the commerce service `GET {base_url}/api/purchase/verify/{tourist}/{tour}`
//! and expects `{"hasPurchased": bool}` back.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;
use waypoint_core::{
  UserId,
  entitlement::{EntitlementError, PurchaseEntitlement},
};

/// Header the gateway uses to forward the authenticated user id.
pub const USER_ID_HEADER: &str = "X-User-ID";

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PurchaseGateConfig {
  pub base_url:   String,
  /// Upper bound on a single verification request, connect included.
  pub timeout_ms: u64,
}

impl Default for PurchaseGateConfig {
  fn default() -> Self {
    Self {
      base_url:   "http://shopping-cart-service:8081".into(),
      timeout_ms: 2_000,
    }
  }
}

// ─── Gate ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
  has_purchased: bool,
}

/// Purchase verification over the commerce service's REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpPurchaseGate {
  client:   Client,
  base_url: String,
}

impl HttpPurchaseGate {
  pub fn new(config: &PurchaseGateConfig) -> reqwest::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_millis(config.timeout_ms))
      .build()?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
    })
  }

  fn verify_url(&self, tourist_id: UserId, tour_id: Uuid) -> String {
    format!("{}/api/purchase/verify/{tourist_id}/{tour_id}", self.base_url)
  }

  async fn verify(&self, tourist_id: UserId, tour_id: Uuid) -> Result<bool, EntitlementError> {
    let resp = self
      .client
      .get(self.verify_url(tourist_id, tour_id))
      .header(USER_ID_HEADER, tourist_id.to_string())
      .send()
      .await
      .map_err(|e| EntitlementError::Unreachable(e.to_string()))?;

    if !resp.status().is_success() {
      return Err(EntitlementError::UnexpectedStatus(resp.status().as_u16()));
    }

    let body: VerifyResponse = resp
      .json()
      .await
      .map_err(|e| EntitlementError::Malformed(e.to_string()))?;
    Ok(body.has_purchased)
  }
}

impl PurchaseEntitlement for HttpPurchaseGate {
  async fn has_purchased(&self, tourist_id: UserId, tour_id: Uuid) -> Result<bool, EntitlementError> {
    let answer = self.verify(tourist_id, tour_id).await;
    tracing::debug!(tourist_id, %tour_id, ?answer, "purchase verification");
    answer
  }
}
