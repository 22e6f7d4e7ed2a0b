//! The `TourStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `waypoint-store-sqlite`). The lifecycle and tracker services depend on
//! this abstraction, not on any concrete backend. Backends are expected to
//! provide atomic single-call reads and writes and nothing stronger, plus the
//! conditional execution writes documented on [`TourStore::create_execution`]
//! and [`TourStore::update_execution`].

use std::future::Future;

use uuid::Uuid;

use crate::{
  UserId,
  execution::{NewExecution, TourExecution},
  tour::{
    KeyPoint, NewKeyPoint, NewTour, StatusTransition, Tour, TourDuration,
    TourView, TransportType,
  },
};

/// Abstraction over a tour store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`). Lookups never
/// return soft-deleted tours.
pub trait TourStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Tours ─────────────────────────────────────────────────────────────

  /// Persist a new Draft tour (price 0, distance 0) together with its key
  /// points. Each key point's `order` is its 1-based position in
  /// `input.key_points`.
  fn create_tour(
    &self,
    author_id: UserId,
    input: NewTour,
  ) -> impl Future<Output = Result<TourView, Self::Error>> + Send + '_;

  fn find_tour(
    &self,
    tour_id: Uuid,
  ) -> impl Future<Output = Result<Option<Tour>, Self::Error>> + Send + '_;

  /// The tour with its ordered key points and its durations.
  fn find_tour_view(
    &self,
    tour_id: Uuid,
  ) -> impl Future<Output = Result<Option<TourView>, Self::Error>> + Send + '_;

  fn tours_by_author(
    &self,
    author_id: UserId,
  ) -> impl Future<Output = Result<Vec<Tour>, Self::Error>> + Send + '_;

  fn published_tours(
    &self,
  ) -> impl Future<Output = Result<Vec<Tour>, Self::Error>> + Send + '_;

  fn update_tour_distance(
    &self,
    tour_id: Uuid,
    distance_km: f64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_tour_status(
    &self,
    tour_id: Uuid,
    transition: StatusTransition,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Key points ────────────────────────────────────────────────────────

  fn create_key_point(
    &self,
    tour_id: Uuid,
    order: u32,
    input: NewKeyPoint,
  ) -> impl Future<Output = Result<KeyPoint, Self::Error>> + Send + '_;

  fn find_key_point(
    &self,
    key_point_id: Uuid,
  ) -> impl Future<Output = Result<Option<KeyPoint>, Self::Error>> + Send + '_;

  /// All key points of a tour, ascending by `order`.
  fn key_points_by_tour(
    &self,
    tour_id: Uuid,
  ) -> impl Future<Output = Result<Vec<KeyPoint>, Self::Error>> + Send + '_;

  /// Overwrite every mutable column of an existing key point.
  fn update_key_point(
    &self,
    key_point: KeyPoint,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_key_point(
    &self,
    key_point_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Durations ─────────────────────────────────────────────────────────

  fn create_duration(
    &self,
    tour_id: Uuid,
    transport_type: TransportType,
    minutes: u32,
  ) -> impl Future<Output = Result<TourDuration, Self::Error>> + Send + '_;

  // ── Executions ────────────────────────────────────────────────────────

  /// Insert a Started execution.
  ///
  /// Returns `Ok(None)` if a Started execution already exists for the same
  /// (tourist, tour) pair. Backends must make this check and the insert a
  /// single atomic step, so concurrent starts cannot both succeed.
  fn create_execution(
    &self,
    input: NewExecution,
  ) -> impl Future<Output = Result<Option<TourExecution>, Self::Error>> + Send + '_;

  fn find_execution(
    &self,
    execution_id: Uuid,
  ) -> impl Future<Output = Result<Option<TourExecution>, Self::Error>> + Send + '_;

  /// The Started execution for the pair, if any.
  fn find_active_execution(
    &self,
    tourist_id: UserId,
    tour_id: Uuid,
  ) -> impl Future<Output = Result<Option<TourExecution>, Self::Error>> + Send + '_;

  /// Every execution of a tour, oldest first.
  fn executions_by_tour(
    &self,
    tour_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TourExecution>, Self::Error>> + Send + '_;

  /// Overwrite status, end time, last activity and the completed set, but
  /// only while the stored execution is still Started.
  ///
  /// Returns `Ok(false)` and writes nothing if the execution has already
  /// ended. The status check and the write must be a single atomic step.
  fn update_execution(
    &self,
    execution: TourExecution,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
