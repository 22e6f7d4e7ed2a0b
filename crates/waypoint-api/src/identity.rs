//! Caller identity forwarded by the API gateway.

use axum::{extract::FromRequestParts, http::request::Parts};
use waypoint_core::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user's numeric id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, taken from the `X-User-ID` header.
///
/// Authentication itself happens upstream; a missing or non-numeric header
/// is rejected with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl<St> FromRequestParts<St> for Caller
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    let raw = parts
      .headers
      .get(USER_ID_HEADER)
      .ok_or_else(|| ApiError::Unauthenticated("missing X-User-ID header".into()))?;

    raw
      .to_str()
      .ok()
      .and_then(|v| v.trim().parse::<UserId>().ok())
      .map(Caller)
      .ok_or_else(|| ApiError::Unauthenticated("X-User-ID is not a user id".into()))
  }
}
