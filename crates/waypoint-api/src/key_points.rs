//! Handlers for key point editing.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/{tour_id}/keypoints` | Ordered by route position; preview rules apply |
//! | `POST`   | `/{tour_id}/keypoints` | Appends to the route; returns 201 |
//! | `PUT`    | `/keypoints/{key_point_id}` | Partial update; every field optional |
//! | `DELETE` | `/keypoints/{key_point_id}` | 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use uuid::Uuid;
use waypoint_core::{
  entitlement::PurchaseEntitlement,
  store::TourStore,
  tour::{KeyPoint, KeyPointPatch, NewKeyPoint},
};

use crate::{ApiState, error::ApiError, identity::Caller};

/// `GET /{tour_id}/keypoints`
pub async fn list<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(viewer_id): Caller,
  Path(tour_id): Path<Uuid>,
) -> Result<Json<Vec<KeyPoint>>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.key_points(tour_id, viewer_id).await?))
}

/// `POST /{tour_id}/keypoints`
pub async fn create<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(tour_id): Path<Uuid>,
  Json(body): Json<NewKeyPoint>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  let kp = state.lifecycle.add_key_point(tour_id, author_id, body).await?;
  Ok((StatusCode::CREATED, Json(kp)))
}

/// `PUT /keypoints/{key_point_id}`
pub async fn update<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(key_point_id): Path<Uuid>,
  Json(patch): Json<KeyPointPatch>,
) -> Result<Json<KeyPoint>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.update_key_point(key_point_id, author_id, patch).await?))
}

/// `DELETE /keypoints/{key_point_id}`
pub async fn delete<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(key_point_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  state.lifecycle.delete_key_point(key_point_id, author_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
