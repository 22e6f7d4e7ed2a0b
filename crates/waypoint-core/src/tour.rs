//! Tour, key point and duration types.
//!
//! A tour is an authored route: an ordered list of key points plus metadata
//! and an authoring status. Its distance is derived from the key points and
//! is never supplied by callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{UserId, geo::Coordinate};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
  #[default]
  Easy,
  Medium,
  Hard,
  Expert,
}

/// Authoring status of a tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TourStatus {
  Draft,
  Published,
  Archived,
}

impl TourStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Published => "published",
      Self::Archived => "archived",
    }
  }
}

/// Transport mode a [`TourDuration`] estimate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
  Walking,
  Bicycle,
  Car,
}

// ─── Status transitions ──────────────────────────────────────────────────────

/// An authoring action that moves a tour between statuses.
///
/// Every action has exactly one legal source status. `Activate` is the only
/// edge leading back out of `Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourAction {
  Publish,
  Archive,
  Activate,
}

impl TourAction {
  /// The only status this action may be applied to.
  pub fn source(self) -> TourStatus {
    match self {
      Self::Publish => TourStatus::Draft,
      Self::Archive => TourStatus::Published,
      Self::Activate => TourStatus::Archived,
    }
  }

  pub fn target(self) -> TourStatus {
    match self {
      Self::Publish | Self::Activate => TourStatus::Published,
      Self::Archive => TourStatus::Archived,
    }
  }

  pub fn past_tense(self) -> &'static str {
    match self {
      Self::Publish => "published",
      Self::Archive => "archived",
      Self::Activate => "activated",
    }
  }

  /// Compute the persisted status fields after applying this action to
  /// `tour` at `now`.
  pub fn apply(self, tour: &Tour, now: DateTime<Utc>) -> StatusTransition {
    let (published_at, archived_at) = match self {
      Self::Publish => (Some(now), tour.archived_at),
      Self::Archive => (tour.published_at, Some(now)),
      Self::Activate => (tour.published_at, None),
    };
    StatusTransition { status: self.target(), published_at, archived_at }
  }
}

/// The status columns written by [`crate::store::TourStore::update_tour_status`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusTransition {
  pub status:       TourStatus,
  pub published_at: Option<DateTime<Utc>>,
  pub archived_at:  Option<DateTime<Utc>>,
}

// ─── Tour ────────────────────────────────────────────────────────────────────

/// A tour record without its child collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
  pub tour_id:      Uuid,
  pub author_id:    UserId,
  pub name:         String,
  pub description:  String,
  pub difficulty:   Difficulty,
  pub tags:         Vec<String>,
  pub status:       TourStatus,
  pub price:        f64,
  /// Haversine length of the route; 0 below two key points.
  pub distance_km:  f64,
  pub published_at: Option<DateTime<Utc>>,
  pub archived_at:  Option<DateTime<Utc>>,
  pub is_deleted:   bool,
  pub created_at:   DateTime<Utc>,
}

impl Tour {
  pub fn is_authored_by(&self, user: UserId) -> bool { self.author_id == user }

  /// Overwrite the status fields with an already-persisted transition.
  pub fn apply_transition(&mut self, transition: StatusTransition) {
    self.status = transition.status;
    self.published_at = transition.published_at;
    self.archived_at = transition.archived_at;
  }
}

/// A tour together with its key points (sorted by `order`) and durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourView {
  #[serde(flatten)]
  pub tour:       Tour,
  pub key_points: Vec<KeyPoint>,
  pub durations:  Vec<TourDuration>,
}

/// Input to [`crate::lifecycle::TourLifecycle::create_tour`].
#[derive(Debug, Clone, Default)]
pub struct NewTour {
  pub name:        String,
  pub description: String,
  pub difficulty:  Difficulty,
  pub tags:        Vec<String>,
  /// Route in visiting order; each point's `order` becomes its 1-based
  /// position in this list.
  pub key_points:  Vec<NewKeyPoint>,
}

// ─── Key points ──────────────────────────────────────────────────────────────

/// A waypoint on a tour's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPoint {
  pub key_point_id: Uuid,
  pub tour_id:      Uuid,
  pub name:         String,
  pub description:  String,
  pub latitude:     f64,
  pub longitude:    f64,
  pub image:        Option<String>,
  /// 1-based route position. Gaps are allowed; only relative order matters.
  pub order:        u32,
}

impl KeyPoint {
  pub fn coordinate(&self) -> Coordinate {
    Coordinate::new(self.latitude, self.longitude)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKeyPoint {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub latitude:    f64,
  pub longitude:   f64,
  #[serde(default)]
  pub image:       Option<String>,
}

impl NewKeyPoint {
  pub fn coordinate(&self) -> Coordinate {
    Coordinate::new(self.latitude, self.longitude)
  }
}

/// A partial key point update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPointPatch {
  pub name:        Option<String>,
  pub description: Option<String>,
  pub latitude:    Option<f64>,
  pub longitude:   Option<f64>,
  pub image:       Option<String>,
  pub order:       Option<u32>,
}

impl KeyPointPatch {
  /// Whether applying this patch can change the tour's route geometry.
  pub fn moves_route(&self) -> bool {
    self.latitude.is_some() || self.longitude.is_some() || self.order.is_some()
  }

  pub fn apply(self, key_point: &mut KeyPoint) {
    if let Some(name) = self.name {
      key_point.name = name;
    }
    if let Some(description) = self.description {
      key_point.description = description;
    }
    if let Some(latitude) = self.latitude {
      key_point.latitude = latitude;
    }
    if let Some(longitude) = self.longitude {
      key_point.longitude = longitude;
    }
    if let Some(image) = self.image {
      key_point.image = Some(image);
    }
    if let Some(order) = self.order {
      key_point.order = order;
    }
  }
}

// ─── Durations ───────────────────────────────────────────────────────────────

/// Estimated time to complete a tour with one transport mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourDuration {
  pub duration_id:    Uuid,
  pub tour_id:        Uuid,
  pub transport_type: TransportType,
  pub minutes:        u32,
  pub created_at:     DateTime<Utc>,
}
