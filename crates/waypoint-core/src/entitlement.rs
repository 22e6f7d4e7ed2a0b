//! Purchase entitlement: "has tourist X bought tour Y?".
//!
//! The answer comes from a remote commerce service. Implementations live in
//! transport crates (e.g. `waypoint-entitlement`); the services here only see
//! the trait.

use std::future::Future;

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::UserId;

/// The gate could not determine entitlement. Never used to mean "not
/// purchased"; that is `Ok(false)`.
#[derive(Debug, Error)]
pub enum EntitlementError {
  #[error("purchase service unreachable: {0}")]
  Unreachable(String),

  #[error("purchase service returned status {0}")]
  UnexpectedStatus(u16),

  #[error("malformed purchase service response: {0}")]
  Malformed(String),
}

pub trait PurchaseEntitlement: Send + Sync {
  /// `Ok(true)` only if the commerce system recorded a completed purchase of
  /// `tour_id` by `tourist_id`.
  fn has_purchased(
    &self,
    tourist_id: UserId,
    tour_id: Uuid,
  ) -> impl Future<Output = Result<bool, EntitlementError>> + Send + '_;
}

/// What starting a tour does when the gate returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementPolicy {
  /// Log the degradation and let the tourist start.
  #[default]
  FailOpen,
  /// Refuse with [`crate::Error::DependencyUnavailable`].
  FailClosed,
}
