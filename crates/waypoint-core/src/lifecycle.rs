//! Tour authoring lifecycle.
//!
//! Tours move Draft → Published → Archived, and Archived → Published again on
//! reactivation. Every mutation is author-only, and every check runs before
//! the first write, so a rejected call never leaves a tour half-changed.
//! Changes to the key point set or its geometry trigger a route distance
//! recomputation.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result, UserId,
  entitlement::PurchaseEntitlement,
  geo::Coordinate,
  route,
  store::TourStore,
  tour::{
    KeyPoint, KeyPointPatch, NewKeyPoint, NewTour, Tour, TourAction,
    TourDuration, TourStatus, TourView, TransportType,
  },
};

// ─── Rules ───────────────────────────────────────────────────────────────────

/// Tunable authoring constraints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleRules {
  pub min_key_points_to_create:  usize,
  pub min_key_points_to_publish: usize,
}

impl Default for LifecycleRules {
  fn default() -> Self {
    Self { min_key_points_to_create: 1, min_key_points_to_publish: 2 }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct TourLifecycle<S, P> {
  store: Arc<S>,
  gate:  Arc<P>,
  rules: LifecycleRules,
}

fn tour_not_found(tour_id: Uuid) -> Error {
  Error::NotFound(format!("tour {tour_id} not found"))
}

fn check_coordinate(c: Coordinate) -> Result<()> {
  if c.is_valid() {
    Ok(())
  } else {
    Err(Error::Validation(format!(
      "coordinate ({}, {}) is out of range",
      c.latitude, c.longitude
    )))
  }
}

impl<S, P> TourLifecycle<S, P>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  pub fn new(store: Arc<S>, gate: Arc<P>, rules: LifecycleRules) -> Self {
    Self { store, gate, rules }
  }

  /// Load a tour and check that `author_id` owns it.
  async fn authored_tour(&self, tour_id: Uuid, author_id: UserId) -> Result<Tour> {
    let tour = self
      .store
      .find_tour(tour_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| tour_not_found(tour_id))?;

    if !tour.is_authored_by(author_id) {
      return Err(Error::Authorization("not tour author".into()));
    }
    Ok(tour)
  }

  /// Load a key point together with its tour, checking authorship.
  async fn authored_key_point(
    &self,
    key_point_id: Uuid,
    author_id: UserId,
  ) -> Result<KeyPoint> {
    let key_point = self
      .store
      .find_key_point(key_point_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("key point {key_point_id} not found")))?;

    self.authored_tour(key_point.tour_id, author_id).await?;
    Ok(key_point)
  }

  // ── Creation ──────────────────────────────────────────────────────────

  /// Create a Draft tour with price 0. Key point `order` follows input
  /// position; the route distance is computed when two or more are given.
  pub async fn create_tour(&self, author_id: UserId, input: NewTour) -> Result<TourView> {
    if input.name.trim().is_empty() {
      return Err(Error::Validation("tour name is required".into()));
    }
    if input.key_points.is_empty()
      || input.key_points.len() < self.rules.min_key_points_to_create
    {
      return Err(Error::Validation(format!(
        "at least {} key point(s) required",
        self.rules.min_key_points_to_create.max(1)
      )));
    }
    for kp in &input.key_points {
      check_coordinate(kp.coordinate())?;
    }

    let point_count = input.key_points.len();
    let mut view = self
      .store
      .create_tour(author_id, input)
      .await
      .map_err(Error::store)?;

    if point_count >= 2 {
      view.tour.distance_km = route::recompute(&*self.store, view.tour.tour_id).await?;
    }

    info!(tour_id = %view.tour.tour_id, author_id, "tour created");
    Ok(view)
  }

  pub async fn add_duration(
    &self,
    tour_id: Uuid,
    author_id: UserId,
    transport_type: TransportType,
    minutes: u32,
  ) -> Result<TourDuration> {
    self.authored_tour(tour_id, author_id).await?;
    if minutes == 0 {
      return Err(Error::Validation("duration must be at least one minute".into()));
    }

    self
      .store
      .create_duration(tour_id, transport_type, minutes)
      .await
      .map_err(Error::store)
  }

  // ── Status transitions ────────────────────────────────────────────────

  /// Draft → Published. Requires a name, a description and at least
  /// `min_key_points_to_publish` key points.
  pub async fn publish_tour(&self, tour_id: Uuid, author_id: UserId) -> Result<TourView> {
    let tour = self.authored_tour(tour_id, author_id).await?;
    Self::check_source(&tour, TourAction::Publish)?;

    let mut view = self
      .store
      .find_tour_view(tour_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| tour_not_found(tour_id))?;

    if view.tour.name.trim().is_empty() || view.tour.description.trim().is_empty() {
      return Err(Error::Validation("tour must have name and description".into()));
    }
    if view.key_points.len() < self.rules.min_key_points_to_publish {
      return Err(Error::Validation(format!(
        "tour must have at least {} key points",
        self.rules.min_key_points_to_publish
      )));
    }

    view.tour = self.apply(tour, TourAction::Publish).await?;
    Ok(view)
  }

  /// Published → Archived.
  pub async fn archive_tour(&self, tour_id: Uuid, author_id: UserId) -> Result<Tour> {
    let tour = self.authored_tour(tour_id, author_id).await?;
    Self::check_source(&tour, TourAction::Archive)?;
    self.apply(tour, TourAction::Archive).await
  }

  /// Archived → Published; clears `archived_at`.
  pub async fn activate_tour(&self, tour_id: Uuid, author_id: UserId) -> Result<Tour> {
    let tour = self.authored_tour(tour_id, author_id).await?;
    Self::check_source(&tour, TourAction::Activate)?;
    self.apply(tour, TourAction::Activate).await
  }

  fn check_source(tour: &Tour, action: TourAction) -> Result<()> {
    if tour.status == action.source() {
      return Ok(());
    }
    Err(Error::InvalidState(format!(
      "only {} tours can be {} (tour is {})",
      action.source().as_str(),
      action.past_tense(),
      tour.status.as_str(),
    )))
  }

  async fn apply(&self, mut tour: Tour, action: TourAction) -> Result<Tour> {
    let transition = action.apply(&tour, Utc::now());
    self
      .store
      .update_tour_status(tour.tour_id, transition)
      .await
      .map_err(Error::store)?;
    tour.apply_transition(transition);

    info!(tour_id = %tour.tour_id, status = tour.status.as_str(), "tour {}", action.past_tense());
    Ok(tour)
  }

  // ── Key points ────────────────────────────────────────────────────────

  /// Append a key point after the current last one.
  pub async fn add_key_point(
    &self,
    tour_id: Uuid,
    author_id: UserId,
    input: NewKeyPoint,
  ) -> Result<KeyPoint> {
    self.authored_tour(tour_id, author_id).await?;
    check_coordinate(input.coordinate())?;

    let existing = self
      .store
      .key_points_by_tour(tour_id)
      .await
      .map_err(Error::store)?;
    let order = existing
      .iter()
      .map(|kp| kp.order)
      .max()
      .unwrap_or(0)
      .checked_add(1)
      .ok_or_else(|| Error::Validation("no order left after the last key point".into()))?;

    let key_point = self
      .store
      .create_key_point(tour_id, order, input)
      .await
      .map_err(Error::store)?;
    route::recompute(&*self.store, tour_id).await?;
    Ok(key_point)
  }

  pub async fn update_key_point(
    &self,
    key_point_id: Uuid,
    author_id: UserId,
    patch: KeyPointPatch,
  ) -> Result<KeyPoint> {
    let mut key_point = self.authored_key_point(key_point_id, author_id).await?;

    let moves_route = patch.moves_route();
    patch.apply(&mut key_point);
    check_coordinate(key_point.coordinate())?;
    if key_point.order == 0 {
      return Err(Error::Validation("key point order is 1-based".into()));
    }

    self
      .store
      .update_key_point(key_point.clone())
      .await
      .map_err(Error::store)?;

    if moves_route {
      route::recompute(&*self.store, key_point.tour_id).await?;
    }
    Ok(key_point)
  }

  /// Remove a key point. Remaining orders are left as they are.
  pub async fn delete_key_point(&self, key_point_id: Uuid, author_id: UserId) -> Result<()> {
    let key_point = self.authored_key_point(key_point_id, author_id).await?;

    self
      .store
      .delete_key_point(key_point_id)
      .await
      .map_err(Error::store)?;
    route::recompute(&*self.store, key_point.tour_id).await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The key points `viewer_id` may see, subject to the same preview rules as
  /// [`Self::tour_for_viewer`].
  pub async fn key_points(&self, tour_id: Uuid, viewer_id: UserId) -> Result<Vec<KeyPoint>> {
    Ok(self.tour_for_viewer(tour_id, viewer_id).await?.key_points)
  }

  pub async fn tours_by_author(&self, author_id: UserId) -> Result<Vec<Tour>> {
    self
      .store
      .tours_by_author(author_id)
      .await
      .map_err(Error::store)
  }

  /// Every published tour, each carrying only its first key point.
  pub async fn published_tours(&self) -> Result<Vec<TourView>> {
    let tours = self.store.published_tours().await.map_err(Error::store)?;

    let mut views = Vec::with_capacity(tours.len());
    for tour in tours {
      let mut key_points = self
        .store
        .key_points_by_tour(tour.tour_id)
        .await
        .map_err(Error::store)?;
      key_points.truncate(1);
      views.push(TourView { tour, key_points, durations: vec![] });
    }
    Ok(views)
  }

  /// A tour as `viewer_id` may see it.
  ///
  /// Authors and tourists who purchased the tour get every key point; anyone
  /// else gets the first one as a preview. Drafts are invisible to everyone
  /// but their author. An unreachable purchase service counts as "not
  /// purchased" here.
  pub async fn tour_for_viewer(&self, tour_id: Uuid, viewer_id: UserId) -> Result<TourView> {
    let mut view = self
      .store
      .find_tour_view(tour_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| tour_not_found(tour_id))?;

    if view.tour.is_authored_by(viewer_id) {
      return Ok(view);
    }
    if view.tour.status == TourStatus::Draft {
      return Err(tour_not_found(tour_id));
    }
    if view.key_points.len() <= 1 {
      return Ok(view);
    }

    let purchased = match self.gate.has_purchased(viewer_id, tour_id).await {
      Ok(purchased) => purchased,
      Err(e) => {
        warn!(%tour_id, viewer_id, error = %e, "purchase check failed, serving preview");
        false
      }
    };
    if !purchased {
      view.key_points.truncate(1);
    }
    Ok(view)
  }
}
