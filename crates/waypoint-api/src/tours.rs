//! Handlers for tour authoring and browsing.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/` | Tours authored by the caller |
//! | `POST` | `/create-tour` | Body: [`CreateTourBody`]; returns 201 |
//! | `GET`  | `/published` | Published tours, first key point only |
//! | `GET`  | `/{tour_id}` | Full tour or preview, depending on the caller |
//! | `PUT`  | `/{tour_id}/publish` | Draft → Published |
//! | `PUT`  | `/{tour_id}/archive` | Published → Archived |
//! | `PUT`  | `/{tour_id}/activate` | Archived → Published |
//! | `POST` | `/{tour_id}/duration` | Body: `{"transportType":"walking","durationMin":45}` |

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
  store::TourStore,
  tour::{Difficulty, NewKeyPoint, NewTour, Tour, TourDuration, TourView, TransportType},
};

use crate::{ApiState, error::ApiError, identity::Caller};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTourBody {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub difficulty:  Difficulty,
  #[serde(default)]
  pub tags:        Vec<String>,
  #[serde(default)]
  pub key_points:  Vec<NewKeyPoint>,
}

impl From<CreateTourBody> for NewTour {
  fn from(body: CreateTourBody) -> Self {
    NewTour {
      name:        body.name,
      description: body.description,
      difficulty:  body.difficulty,
      tags:        body.tags,
      key_points:  body.key_points,
    }
  }
}

/// `POST /create-tour`
pub async fn create<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Json(body): Json<CreateTourBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  let view = state.lifecycle.create_tour(author_id, body.into()).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /`
pub async fn mine<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
) -> Result<Json<Vec<Tour>>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.tours_by_author(author_id).await?))
}

/// `GET /published`
pub async fn published<S, P>(
  State(state): State<ApiState<S, P>>,
) -> Result<Json<Vec<TourView>>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.published_tours().await?))
}

/// `GET /{tour_id}`
pub async fn get_one<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(viewer_id): Caller,
  Path(tour_id): Path<Uuid>,
) -> Result<Json<TourView>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.tour_for_viewer(tour_id, viewer_id).await?))
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// `PUT /{tour_id}/publish`
pub async fn publish<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(tour_id): Path<Uuid>,
) -> Result<Json<TourView>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.publish_tour(tour_id, author_id).await?))
}

/// `PUT /{tour_id}/archive`
pub async fn archive<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(tour_id): Path<Uuid>,
) -> Result<Json<Tour>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.archive_tour(tour_id, author_id).await?))
}

/// `PUT /{tour_id}/activate`
pub async fn activate<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(tour_id): Path<Uuid>,
) -> Result<Json<Tour>, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  Ok(Json(state.lifecycle.activate_tour(tour_id, author_id).await?))
}

// ─── Durations ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationBody {
  pub transport_type: TransportType,
  pub duration_min:   u32,
}

/// `POST /{tour_id}/duration`
pub async fn add_duration<S, P>(
  State(state): State<ApiState<S, P>>,
  Caller(author_id): Caller,
  Path(tour_id): Path<Uuid>,
  Json(body): Json<DurationBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  let duration: TourDuration = state
    .lifecycle
    .add_duration(tour_id, author_id, body.transport_type, body.duration_min)
    .await?;
  Ok((StatusCode::CREATED, Json(duration)))
}
