//! Handlers for tour executions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/{tour_id}/start` | Body: `{"startLat":..,"startLng":..}`; returns 201 |
//! | `POST` | `/executions/{id}/check-position` | Body: `{"currentLat":..,"currentLng":..}`; returns newly reached key point ids |
//! | `PUT`  | `/executions/{id}/complete` | |
//! | `PUT`  | `/executions/{id}/abandon` | |
//! | `GET`  | `/executions/active/{tour_id}` | 404 when the caller has no run in progress |
//! | `GET`  | `/executions/{id}` | Tourist or tour author |
//! | `GET`  | `/executions/tour/{tour_id}` | Tour author only |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use waypoint_core::{
  entitlement::PurchaseEntitlement,
  execution::TourExecution,
  geo::Coordinate,
  store::TourStore,
};

use crate::{ApiState, error::ApiError, identity::Caller};

// ─── Start ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
  pub start_lat: f64,
  pub start_lng: f64,
}

/// `POST /{tour_id}/start`
pub async fn start<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(tourist_id): Caller,
  Path(tour_id): Path<Uuid>,
  Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  let start = Coordinate::new(body.start_lat, body.start_lng);
  if !start.is_valid() {
    return Err(ApiError::BadRequest("start position out of range".into()));
  }
  let execution = state.tracker.start_tour(tour_id, tourist_id, start).await?;
  Ok((StatusCode::CREATED, Json(execution)))
}

// ─── Position ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionBody {
  pub current_lat: f64,
  pub current_lng: f64,
}

/// `POST /executions/{execution_id}/check-position`
pub async fn check_position<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(tourist_id): Caller,
  Path(execution_id): Path<Uuid>,
  Json(body): Json<PositionBody>,
) -> Result<Json<Vec<Uuid>>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  let position = Coordinate::new(body.current_lat, body.current_lng);
  if !position.is_valid() {
    return Err(ApiError::BadRequest("position out of range".into()));
  }
  let reached = state
    .tracker
    .check_position(execution_id, tourist_id, position)
    .await?;
  Ok(Json(reached))
}

// ─── Finish ──────────────────────────────────────────────────────────────────

/// `PUT /executions/{execution_id}/complete`
pub async fn complete<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(tourist_id): Caller,
  Path(execution_id): Path<Uuid>,
) -> Result<Json<TourExecution>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.tracker.complete_tour(execution_id, tourist_id).await?))
}

/// `PUT /executions/{execution_id}/abandon`
pub async fn abandon<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(tourist_id): Caller,
  Path(execution_id): Path<Uuid>,
) -> Result<Json<TourExecution>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.tracker.abandon_tour(execution_id, tourist_id).await?))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /executions/active/{tour_id}`
pub async fn active<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(tourist_id): Caller,
  Path(tour_id): Path<Uuid>,
) -> Result<Json<TourExecution>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  let execution = state
    .tracker
    .active_execution(tourist_id, tour_id)
    .await?
    .ok_or_else(|| {
      waypoint_core::Error::NotFound(format!("no tour execution in progress for tour {tour_id}"))
    })?;
  Ok(Json(execution))
}

/// `GET /executions/{execution_id}`
pub async fn get_one<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(caller): Caller,
  Path(execution_id): Path<Uuid>,
) -> Result<Json<TourExecution>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.tracker.execution_details(execution_id, caller).await?))
}

/// `GET /executions/tour/{tour_id}`
pub async fn by_tour<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(tour_id): Path<Uuid>,
) -> Result<Json<Vec<TourExecution>>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.tracker.executions_by_tour(tour_id, author_id).await?))
}
