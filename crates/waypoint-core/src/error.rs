//! Error types for `waypoint-core`.

use thiserror::Error;

use crate::entitlement::EntitlementError;

/// Every failure an engine operation can report.
///
/// All variants except [`Error::Store`] and [`Error::DependencyUnavailable`]
/// are caller errors; none of them is raised after a write has happened.
#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("not authorized: {0}")]
  Authorization(String),

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("dependency unavailable: {0}")]
  DependencyUnavailable(#[from] EntitlementError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error; used as `.map_err(Error::store)`.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
