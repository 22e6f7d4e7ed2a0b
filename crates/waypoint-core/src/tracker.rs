//! Tour execution tracking.
//!
//! An execution starts in `Started` once the tourist's entitlement is
//! confirmed, accumulates completed key points as position reports land
//! inside their geofence, and ends in `Completed` or `Abandoned`. Both end
//! states are terminal.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result, UserId,
  entitlement::{EntitlementPolicy, PurchaseEntitlement},
  execution::{ExecutionStatus, NewExecution, TourExecution},
  geo::{Coordinate, within_radius},
  store::TourStore,
  tour::TourStatus,
};

/// Geofence radius around every key point: 50 metres.
pub const DEFAULT_GEOFENCE_RADIUS_KM: f64 = 0.05;

// ─── Rules ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerRules {
  pub geofence_radius_km:     f64,
  /// Refuse to complete an execution while key points remain unvisited.
  pub require_all_key_points: bool,
  pub entitlement_policy:     EntitlementPolicy,
}

impl Default for TrackerRules {
  fn default() -> Self {
    Self {
      geofence_radius_km:     DEFAULT_GEOFENCE_RADIUS_KM,
      require_all_key_points: false,
      entitlement_policy:     EntitlementPolicy::default(),
    }
  }
}

impl TrackerRules {
  /// Reject a geofence that no position could ever fall inside.
  pub fn validate(&self) -> Result<()> {
    let radius = self.geofence_radius_km;
    if !radius.is_finite() || radius <= 0.0 {
      return Err(Error::Validation(format!(
        "geofence radius must be a positive number of kilometres, got {radius}"
      )));
    }
    Ok(())
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct ExecutionTracker<S, P> {
  store:           Arc<S>,
  gate:            Arc<P>,
  rules:           TrackerRules,
  /// Starts let through because the purchase service could not answer.
  degraded_starts: AtomicU64,
}

fn execution_not_found(execution_id: Uuid) -> Error {
  Error::NotFound(format!("tour execution {execution_id} not found"))
}

impl<S, P> ExecutionTracker<S, P>
where
  S: TourStore,
  P: PurchaseEntitlement,
{
  pub fn new(store: Arc<S>, gate: Arc<P>, rules: TrackerRules) -> Self {
    Self { store, gate, rules, degraded_starts: AtomicU64::new(0) }
  }

  /// Number of executions started without a confirmed purchase because the
  /// purchase service was unavailable.
  pub fn degraded_starts(&self) -> u64 { self.degraded_starts.load(Ordering::Relaxed) }

  /// Load an execution and check that `tourist_id` owns it.
  async fn owned_execution(&self, execution_id: Uuid, tourist_id: UserId) -> Result<TourExecution> {
    let execution = self
      .store
      .find_execution(execution_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| execution_not_found(execution_id))?;

    if execution.tourist_id != tourist_id {
      return Err(Error::Authorization("tour execution belongs to another tourist".into()));
    }
    Ok(execution)
  }

  // ── Start ─────────────────────────────────────────────────────────────

  /// Start a run of `tour_id` for `tourist_id`.
  ///
  /// Fails with `Conflict` if the tourist already has a Started execution of
  /// this tour and with `Authorization` if the purchase service says the tour
  /// was not bought. If the purchase service cannot answer, the configured
  /// [`EntitlementPolicy`] decides.
  pub async fn start_tour(
    &self,
    tour_id: Uuid,
    tourist_id: UserId,
    start: Coordinate,
  ) -> Result<TourExecution> {
    let active = self
      .store
      .find_active_execution(tourist_id, tour_id)
      .await
      .map_err(Error::store)?;
    if active.is_some() {
      return Err(Error::Conflict("tour already in progress".into()));
    }

    let tour = self
      .store
      .find_tour(tour_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("tour {tour_id} not found")))?;
    if tour.status != TourStatus::Published {
      return Err(Error::InvalidState(format!(
        "only published tours can be started (tour is {})",
        tour.status.as_str()
      )));
    }

    match self.gate.has_purchased(tourist_id, tour_id).await {
      Ok(true) => {}
      Ok(false) => {
        return Err(Error::Authorization("must purchase tour before starting".into()));
      }
      Err(e) => match self.rules.entitlement_policy {
        EntitlementPolicy::FailOpen => {
          let degraded = self.degraded_starts.fetch_add(1, Ordering::Relaxed) + 1;
          warn!(
            %tour_id,
            tourist_id,
            degraded,
            error = %e,
            "purchase service unavailable, allowing tour start"
          );
        }
        EntitlementPolicy::FailClosed => return Err(e.into()),
      },
    }

    let execution = self
      .store
      .create_execution(NewExecution { tour_id, tourist_id, start })
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::Conflict("tour already in progress".into()))?;

    info!(execution_id = %execution.execution_id, %tour_id, tourist_id, "tour started");
    Ok(execution)
  }

  // ── Position ──────────────────────────────────────────────────────────

  /// Mark every not-yet-completed key point within the geofence of
  /// `position` as completed, returning the ids newly completed by this
  /// call. Nothing is written when the list is empty.
  pub async fn check_position(
    &self,
    execution_id: Uuid,
    tourist_id: UserId,
    position: Coordinate,
  ) -> Result<Vec<Uuid>> {
    let mut execution = self.owned_execution(execution_id, tourist_id).await?;
    if execution.status != ExecutionStatus::Started {
      return Err(Error::InvalidState("tour execution is not in progress".into()));
    }

    let key_points = self
      .store
      .key_points_by_tour(execution.tour_id)
      .await
      .map_err(Error::store)?;

    let newly_completed: Vec<Uuid> = key_points
      .iter()
      .filter(|kp| !execution.has_completed(kp.key_point_id))
      .filter(|kp| within_radius(position, kp.coordinate(), self.rules.geofence_radius_km))
      .map(|kp| kp.key_point_id)
      .collect();

    if newly_completed.is_empty() {
      return Ok(newly_completed);
    }

    execution.completed_key_points.extend(newly_completed.iter().copied());
    execution.last_activity = Utc::now();
    let written = self
      .store
      .update_execution(execution)
      .await
      .map_err(Error::store)?;
    if !written {
      // Finished between the read above and this write.
      return Err(Error::InvalidState("tour execution is not in progress".into()));
    }

    debug!(%execution_id, reached = newly_completed.len(), "key points reached");
    Ok(newly_completed)
  }

  // ── Finish ────────────────────────────────────────────────────────────

  pub async fn complete_tour(&self, execution_id: Uuid, tourist_id: UserId) -> Result<TourExecution> {
    self.finish(execution_id, tourist_id, ExecutionStatus::Completed).await
  }

  pub async fn abandon_tour(&self, execution_id: Uuid, tourist_id: UserId) -> Result<TourExecution> {
    self.finish(execution_id, tourist_id, ExecutionStatus::Abandoned).await
  }

  /// Move a Started execution into `status`. An execution that is already
  /// terminal is returned unchanged.
  async fn finish(
    &self,
    execution_id: Uuid,
    tourist_id: UserId,
    status: ExecutionStatus,
  ) -> Result<TourExecution> {
    let mut execution = self.owned_execution(execution_id, tourist_id).await?;
    if execution.status.is_terminal() {
      debug!(%execution_id, status = ?execution.status, "execution already finished");
      return Ok(execution);
    }

    if status == ExecutionStatus::Completed && self.rules.require_all_key_points {
      let key_points = self
        .store
        .key_points_by_tour(execution.tour_id)
        .await
        .map_err(Error::store)?;
      let unvisited = key_points
        .iter()
        .filter(|kp| !execution.has_completed(kp.key_point_id))
        .count();
      if unvisited > 0 {
        return Err(Error::Validation(format!(
          "{unvisited} key point(s) not yet visited"
        )));
      }
    }

    execution.finish(status, Utc::now());
    let written = self
      .store
      .update_execution(execution.clone())
      .await
      .map_err(Error::store)?;
    if !written {
      debug!(%execution_id, "execution finished concurrently");
      return self
        .store
        .find_execution(execution_id)
        .await
        .map_err(Error::store)?
        .ok_or_else(|| execution_not_found(execution_id));
    }

    info!(%execution_id, status = ?status, "tour execution finished");
    Ok(execution)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The tourist's Started execution of `tour_id`, used to resume a run.
  pub async fn active_execution(
    &self,
    tourist_id: UserId,
    tour_id: Uuid,
  ) -> Result<Option<TourExecution>> {
    self
      .store
      .find_active_execution(tourist_id, tour_id)
      .await
      .map_err(Error::store)
  }

  /// An execution, visible to its tourist and to the tour's author.
  pub async fn execution_details(&self, execution_id: Uuid, caller: UserId) -> Result<TourExecution> {
    let execution = self
      .store
      .find_execution(execution_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| execution_not_found(execution_id))?;

    if execution.tourist_id == caller {
      return Ok(execution);
    }
    let authored = self
      .store
      .find_tour(execution.tour_id)
      .await
      .map_err(Error::store)?
      .is_some_and(|t| t.is_authored_by(caller));
    if !authored {
      return Err(Error::Authorization("not allowed to view this execution".into()));
    }
    Ok(execution)
  }

  /// Every execution of a tour; author only.
  pub async fn executions_by_tour(&self, tour_id: Uuid, author_id: UserId) -> Result<Vec<TourExecution>> {
    let tour = self
      .store
      .find_tour(tour_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("tour {tour_id} not found")))?;
    if !tour.is_authored_by(author_id) {
      return Err(Error::Authorization("not tour author".into()));
    }

    self
      .store
      .executions_by_tour(tour_id)
      .await
      .map_err(Error::store)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    lifecycle::{LifecycleRules, TourLifecycle},
    testing::{Answer, MemoryStore, ScriptedGate},
    tour::{NewKeyPoint, NewTour},
  };

  const AUTHOR: UserId = 1;
  const TOURIST: UserId = 2;
  const OTHER: UserId = 3;

  struct Fixture {
    store:   Arc<MemoryStore>,
    gate:    Arc<ScriptedGate>,
    tracker: ExecutionTracker<MemoryStore, ScriptedGate>,
    tour_id: Uuid,
    k1:      Uuid,
    k2:      Uuid,
  }

  fn point(name: &str, latitude: f64, longitude: f64) -> NewKeyPoint {
    NewKeyPoint {
      name: name.into(),
      description: String::new(),
      latitude,
      longitude,
      image: None,
    }
  }

  async fn fixture_with(answer: Answer, rules: TrackerRules) -> Fixture {
    let store = Arc::new(MemoryStore::default());
    let gate = Arc::new(ScriptedGate::new(answer));
    let lifecycle = TourLifecycle::new(store.clone(), gate.clone(), LifecycleRules::default());

    // K1 at the origin, K2 ~111 m east.
    let view = lifecycle
      .create_tour(AUTHOR, NewTour {
        name: "Harbour loop".into(),
        description: "Two stops".into(),
        key_points: vec![point("K1", 0.0, 0.0), point("K2", 0.0, 0.001)],
        ..Default::default()
      })
      .await
      .unwrap();
    let tour_id = view.tour.tour_id;
    lifecycle.publish_tour(tour_id, AUTHOR).await.unwrap();

    let tracker = ExecutionTracker::new(store.clone(), gate.clone(), rules);
    Fixture {
      store,
      gate,
      tracker,
      tour_id,
      k1: view.key_points[0].key_point_id,
      k2: view.key_points[1].key_point_id,
    }
  }

  async fn fixture(answer: Answer) -> Fixture { fixture_with(answer, TrackerRules::default()).await }

  const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);

  #[test]
  fn geofence_radius_must_be_positive() {
    assert!(TrackerRules::default().validate().is_ok());
    for radius in [0.0, -0.05, f64::NAN, f64::INFINITY] {
      let rules = TrackerRules { geofence_radius_km: radius, ..Default::default() };
      assert!(matches!(rules.validate(), Err(Error::Validation(_))), "{radius}");
    }
  }

  // ── Start ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn purchased_tour_starts() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, Coordinate::new(0.1, 0.2)).await.unwrap();

    assert_eq!(ex.status, ExecutionStatus::Started);
    assert!(ex.completed_key_points.is_empty());
    assert!(ex.end_time.is_none());
    assert_eq!(ex.start_time, ex.last_activity);
    assert_eq!((ex.starting_latitude, ex.starting_longitude), (0.1, 0.2));
  }

  #[tokio::test]
  async fn unpurchased_tour_is_refused_without_creating_anything() {
    let f = fixture(Answer::NotPurchased).await;
    let err = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
    assert_eq!(f.store.execution_count(), 0);
  }

  #[tokio::test]
  async fn second_start_conflicts() {
    let f = fixture(Answer::Purchased).await;
    f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    let err = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(f.store.execution_count(), 1);
    // The conflict is detected before the purchase service is asked again.
    assert_eq!(f.gate.calls(), 1);
  }

  #[tokio::test]
  async fn other_tourists_start_independently() {
    let f = fixture(Answer::Purchased).await;
    f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    f.tracker.start_tour(f.tour_id, OTHER, ORIGIN).await.unwrap();
    assert_eq!(f.store.execution_count(), 2);
  }

  #[tokio::test]
  async fn unreachable_gate_fails_open() {
    let f = fixture(Answer::Unreachable).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    assert_eq!(ex.status, ExecutionStatus::Started);
    assert_eq!(f.tracker.degraded_starts(), 1);
  }

  #[tokio::test]
  async fn unreachable_gate_fails_closed_when_configured() {
    let rules = TrackerRules {
      entitlement_policy: EntitlementPolicy::FailClosed,
      ..Default::default()
    };
    let f = fixture_with(Answer::Unreachable, rules).await;
    let err = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap_err();
    assert!(matches!(err, Error::DependencyUnavailable(_)));
    assert_eq!(f.store.execution_count(), 0);
    assert_eq!(f.tracker.degraded_starts(), 0);
  }

  #[tokio::test]
  async fn unknown_tour_cannot_start() {
    let f = fixture(Answer::Purchased).await;
    let err = f.tracker.start_tour(Uuid::new_v4(), TOURIST, ORIGIN).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn restart_after_finishing() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    f.tracker.abandon_tour(ex.execution_id, TOURIST).await.unwrap();

    let again = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    assert_ne!(again.execution_id, ex.execution_id);
  }

  // ── Position ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn key_point_is_reported_once() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    let first = f.tracker.check_position(ex.execution_id, TOURIST, ORIGIN).await.unwrap();
    assert_eq!(first, vec![f.k1]);

    let again = f.tracker.check_position(ex.execution_id, TOURIST, ORIGIN).await.unwrap();
    assert!(again.is_empty());

    let stored = f.tracker.execution_details(ex.execution_id, TOURIST).await.unwrap();
    assert_eq!(stored.completed_key_points.len(), 1);
    assert!(stored.has_completed(f.k1));
  }

  #[tokio::test]
  async fn geofence_is_fifty_metres_inclusive() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    // ~50.04 m from K1 and ~61 m from K2.
    let outside = Coordinate::new(0.0, 0.00045);
    assert!(f.tracker.check_position(ex.execution_id, TOURIST, outside).await.unwrap().is_empty());

    // ~44 m from K2.
    let inside = Coordinate::new(0.0, 0.0006);
    let reached = f.tracker.check_position(ex.execution_id, TOURIST, inside).await.unwrap();
    assert_eq!(reached, vec![f.k2]);
  }

  #[tokio::test]
  async fn empty_check_writes_nothing() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    let far = Coordinate::new(10.0, 10.0);
    f.tracker.check_position(ex.execution_id, TOURIST, far).await.unwrap();

    let stored = f.tracker.execution_details(ex.execution_id, TOURIST).await.unwrap();
    assert_eq!(stored, ex);
  }

  #[tokio::test]
  async fn only_the_owner_reports_positions() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    let err = f.tracker.check_position(ex.execution_id, OTHER, ORIGIN).await.unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
  }

  #[tokio::test]
  async fn finished_execution_rejects_positions() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    f.tracker.complete_tour(ex.execution_id, TOURIST).await.unwrap();
    let err = f.tracker.check_position(ex.execution_id, TOURIST, ORIGIN).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
  }

  #[tokio::test]
  async fn position_landing_after_a_finish_does_not_reopen_the_run() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    f.store.end_after_next_read(ex.execution_id);
    let err = f.tracker.check_position(ex.execution_id, TOURIST, ORIGIN).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    let stored = f.store.execution(ex.execution_id);
    assert_eq!(stored.status, ExecutionStatus::Abandoned);
    assert!(stored.end_time.is_some());
    assert!(!stored.has_completed(f.k1));
  }

  // ── Finish ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn complete_stamps_end_time_without_full_coverage() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    let done = f.tracker.complete_tour(ex.execution_id, TOURIST).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.end_time, Some(done.last_activity));
    assert!(f.tracker.active_execution(TOURIST, f.tour_id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn finishing_twice_returns_the_terminal_execution() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    let abandoned = f.tracker.abandon_tour(ex.execution_id, TOURIST).await.unwrap();
    let again = f.tracker.complete_tour(ex.execution_id, TOURIST).await.unwrap();
    assert_eq!(again, abandoned);
    assert_eq!(again.status, ExecutionStatus::Abandoned);
  }

  #[tokio::test]
  async fn concurrent_finish_keeps_the_first_outcome() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    f.store.end_after_next_read(ex.execution_id);
    let done = f.tracker.complete_tour(ex.execution_id, TOURIST).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Abandoned);
    assert_eq!(f.store.execution(ex.execution_id), done);
  }

  #[tokio::test]
  async fn complete_can_require_every_key_point() {
    let rules = TrackerRules { require_all_key_points: true, ..Default::default() };
    let f = fixture_with(Answer::Purchased, rules).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    f.tracker.check_position(ex.execution_id, TOURIST, ORIGIN).await.unwrap();
    let err = f.tracker.complete_tour(ex.execution_id, TOURIST).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    f.tracker
      .check_position(ex.execution_id, TOURIST, Coordinate::new(0.0, 0.001))
      .await
      .unwrap();
    let done = f.tracker.complete_tour(ex.execution_id, TOURIST).await.unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed);

    // Abandoning never requires coverage.
    let next = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    f.tracker.abandon_tour(next.execution_id, TOURIST).await.unwrap();
  }

  #[tokio::test]
  async fn missing_execution_is_not_found() {
    let f = fixture(Answer::Purchased).await;
    let err = f.tracker.complete_tour(Uuid::new_v4(), TOURIST).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn active_execution_resumes_a_run() {
    let f = fixture(Answer::Purchased).await;
    assert!(f.tracker.active_execution(TOURIST, f.tour_id).await.unwrap().is_none());

    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    let active = f.tracker.active_execution(TOURIST, f.tour_id).await.unwrap().unwrap();
    assert_eq!(active.execution_id, ex.execution_id);
  }

  #[tokio::test]
  async fn executions_by_tour_is_author_only() {
    let f = fixture(Answer::Purchased).await;
    f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();
    f.tracker.start_tour(f.tour_id, OTHER, ORIGIN).await.unwrap();

    assert_eq!(f.tracker.executions_by_tour(f.tour_id, AUTHOR).await.unwrap().len(), 2);
    assert!(matches!(
      f.tracker.executions_by_tour(f.tour_id, TOURIST).await,
      Err(Error::Authorization(_))
    ));
  }

  #[tokio::test]
  async fn details_visible_to_tourist_and_author_only() {
    let f = fixture(Answer::Purchased).await;
    let ex = f.tracker.start_tour(f.tour_id, TOURIST, ORIGIN).await.unwrap();

    assert!(f.tracker.execution_details(ex.execution_id, AUTHOR).await.is_ok());
    assert!(matches!(
      f.tracker.execution_details(ex.execution_id, OTHER).await,
      Err(Error::Authorization(_))
    ));
  }
}
