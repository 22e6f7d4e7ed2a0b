//! In-memory [`TourStore`] and scripted [`PurchaseEntitlement`] for unit tests.

use std::{
  collections::{BTreeSet, HashMap},
  convert::Infallible,
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  UserId,
  entitlement::{EntitlementError, PurchaseEntitlement},
  execution::{ExecutionStatus, NewExecution, TourExecution},
  store::TourStore,
  tour::{
    KeyPoint, NewKeyPoint, NewTour, StatusTransition, Tour, TourDuration,
    TourStatus, TourView, TransportType,
  },
};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
  tours:      HashMap<Uuid, Tour>,
  key_points: HashMap<Uuid, KeyPoint>,
  durations:  Vec<TourDuration>,
  executions: Vec<TourExecution>,
  /// Execution to end as `Abandoned` right after its next lookup.
  end_after_read: Option<Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
    let mut guard = self.state.lock().unwrap();
    f(&mut guard)
  }

  pub fn execution_count(&self) -> usize { self.with(|s| s.executions.len()) }

  pub fn tour(&self, tour_id: Uuid) -> Tour {
    self.with(|s| s.tours[&tour_id].clone())
  }

  /// The next `find_execution` of `execution_id` returns the row as it is,
  /// then abandons it, as if another request finished the run in between.
  pub fn end_after_next_read(&self, execution_id: Uuid) {
    self.with(|s| s.end_after_read = Some(execution_id));
  }

  pub fn execution(&self, execution_id: Uuid) -> TourExecution {
    self.with(|s| {
      s.executions
        .iter()
        .find(|e| e.execution_id == execution_id)
        .cloned()
        .unwrap()
    })
  }

  pub fn soft_delete(&self, tour_id: Uuid) {
    self.with(|s| {
      if let Some(t) = s.tours.get_mut(&tour_id) {
        t.is_deleted = true;
      }
    });
  }
}

fn ordered_points(state: &State, tour_id: Uuid) -> Vec<KeyPoint> {
  let mut points: Vec<KeyPoint> = state
    .key_points
    .values()
    .filter(|kp| kp.tour_id == tour_id)
    .cloned()
    .collect();
  points.sort_by_key(|kp| kp.order);
  points
}

fn new_key_point(tour_id: Uuid, order: u32, input: NewKeyPoint) -> KeyPoint {
  KeyPoint {
    key_point_id: Uuid::new_v4(),
    tour_id,
    name: input.name,
    description: input.description,
    latitude: input.latitude,
    longitude: input.longitude,
    image: input.image,
    order,
  }
}

impl TourStore for MemoryStore {
  type Error = Infallible;

  async fn create_tour(&self, author_id: UserId, input: NewTour) -> Result<TourView, Infallible> {
    let tour = Tour {
      tour_id: Uuid::new_v4(),
      author_id,
      name: input.name,
      description: input.description,
      difficulty: input.difficulty,
      tags: input.tags,
      status: TourStatus::Draft,
      price: 0.0,
      distance_km: 0.0,
      published_at: None,
      archived_at: None,
      is_deleted: false,
      created_at: Utc::now(),
    };
    let key_points: Vec<KeyPoint> = input
      .key_points
      .into_iter()
      .zip(1..)
      .map(|(kp, order)| new_key_point(tour.tour_id, order, kp))
      .collect();

    self.with(|s| {
      s.tours.insert(tour.tour_id, tour.clone());
      for kp in &key_points {
        s.key_points.insert(kp.key_point_id, kp.clone());
      }
    });
    Ok(TourView { tour, key_points, durations: vec![] })
  }

  async fn find_tour(&self, tour_id: Uuid) -> Result<Option<Tour>, Infallible> {
    Ok(self.with(|s| s.tours.get(&tour_id).filter(|t| !t.is_deleted).cloned()))
  }

  async fn find_tour_view(&self, tour_id: Uuid) -> Result<Option<TourView>, Infallible> {
    Ok(self.with(|s| {
      let tour = s.tours.get(&tour_id).filter(|t| !t.is_deleted)?.clone();
      let durations = s.durations.iter().filter(|d| d.tour_id == tour_id).cloned().collect();
      Some(TourView { key_points: ordered_points(s, tour_id), tour, durations })
    }))
  }

  async fn tours_by_author(&self, author_id: UserId) -> Result<Vec<Tour>, Infallible> {
    Ok(self.with(|s| {
      s.tours
        .values()
        .filter(|t| t.author_id == author_id && !t.is_deleted)
        .cloned()
        .collect()
    }))
  }

  async fn published_tours(&self) -> Result<Vec<Tour>, Infallible> {
    Ok(self.with(|s| {
      s.tours
        .values()
        .filter(|t| t.status == TourStatus::Published && !t.is_deleted)
        .cloned()
        .collect()
    }))
  }

  async fn update_tour_distance(&self, tour_id: Uuid, distance_km: f64) -> Result<(), Infallible> {
    self.with(|s| {
      if let Some(t) = s.tours.get_mut(&tour_id) {
        t.distance_km = distance_km;
      }
    });
    Ok(())
  }

  async fn update_tour_status(
    &self,
    tour_id: Uuid,
    transition: StatusTransition,
  ) -> Result<(), Infallible> {
    self.with(|s| {
      if let Some(t) = s.tours.get_mut(&tour_id) {
        t.apply_transition(transition);
      }
    });
    Ok(())
  }

  async fn create_key_point(
    &self,
    tour_id: Uuid,
    order: u32,
    input: NewKeyPoint,
  ) -> Result<KeyPoint, Infallible> {
    let kp = new_key_point(tour_id, order, input);
    self.with(|s| s.key_points.insert(kp.key_point_id, kp.clone()));
    Ok(kp)
  }

  async fn find_key_point(&self, key_point_id: Uuid) -> Result<Option<KeyPoint>, Infallible> {
    Ok(self.with(|s| s.key_points.get(&key_point_id).cloned()))
  }

  async fn key_points_by_tour(&self, tour_id: Uuid) -> Result<Vec<KeyPoint>, Infallible> {
    Ok(self.with(|s| ordered_points(s, tour_id)))
  }

  async fn update_key_point(&self, key_point: KeyPoint) -> Result<(), Infallible> {
    self.with(|s| s.key_points.insert(key_point.key_point_id, key_point));
    Ok(())
  }

  async fn delete_key_point(&self, key_point_id: Uuid) -> Result<(), Infallible> {
    self.with(|s| s.key_points.remove(&key_point_id));
    Ok(())
  }

  async fn create_duration(
    &self,
    tour_id: Uuid,
    transport_type: TransportType,
    minutes: u32,
  ) -> Result<TourDuration, Infallible> {
    let duration = TourDuration {
      duration_id: Uuid::new_v4(),
      tour_id,
      transport_type,
      minutes,
      created_at: Utc::now(),
    };
    self.with(|s| s.durations.push(duration.clone()));
    Ok(duration)
  }

  async fn create_execution(&self, input: NewExecution) -> Result<Option<TourExecution>, Infallible> {
    Ok(self.with(|s| {
      let taken = s.executions.iter().any(|e| {
        e.tourist_id == input.tourist_id
          && e.tour_id == input.tour_id
          && e.status == ExecutionStatus::Started
      });
      if taken {
        return None;
      }
      let now = Utc::now();
      let execution = TourExecution {
        execution_id: Uuid::new_v4(),
        tour_id: input.tour_id,
        tourist_id: input.tourist_id,
        status: ExecutionStatus::Started,
        start_time: now,
        end_time: None,
        last_activity: now,
        completed_key_points: BTreeSet::new(),
        starting_latitude: input.start.latitude,
        starting_longitude: input.start.longitude,
      };
      s.executions.push(execution.clone());
      Some(execution)
    }))
  }

  async fn find_execution(&self, execution_id: Uuid) -> Result<Option<TourExecution>, Infallible> {
    Ok(self.with(|s| {
      let slot = s.executions.iter_mut().find(|e| e.execution_id == execution_id)?;
      let found = slot.clone();
      if s.end_after_read == Some(execution_id) {
        s.end_after_read = None;
        slot.finish(ExecutionStatus::Abandoned, Utc::now());
      }
      Some(found)
    }))
  }

  async fn find_active_execution(
    &self,
    tourist_id: UserId,
    tour_id: Uuid,
  ) -> Result<Option<TourExecution>, Infallible> {
    Ok(self.with(|s| {
      s.executions
        .iter()
        .find(|e| {
          e.tourist_id == tourist_id
            && e.tour_id == tour_id
            && e.status == ExecutionStatus::Started
        })
        .cloned()
    }))
  }

  async fn executions_by_tour(&self, tour_id: Uuid) -> Result<Vec<TourExecution>, Infallible> {
    Ok(self.with(|s| s.executions.iter().filter(|e| e.tour_id == tour_id).cloned().collect()))
  }

  async fn update_execution(&self, execution: TourExecution) -> Result<bool, Infallible> {
    Ok(self.with(|s| {
      match s.executions.iter_mut().find(|e| {
        e.execution_id == execution.execution_id && e.status == ExecutionStatus::Started
      }) {
        Some(slot) => {
          *slot = execution;
          true
        }
        None => false,
      }
    }))
  }
}

// ─── Entitlement gate ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
  Purchased,
  NotPurchased,
  Unreachable,
}

/// Returns the same scripted answer for every query and counts calls.
pub struct ScriptedGate {
  answer: Answer,
  calls:  AtomicUsize,
}

impl ScriptedGate {
  pub fn new(answer: Answer) -> Self { Self { answer, calls: AtomicUsize::new(0) } }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl PurchaseEntitlement for ScriptedGate {
  async fn has_purchased(&self, _tourist_id: UserId, _tour_id: Uuid) -> Result<bool, EntitlementError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match self.answer {
      Answer::Purchased => Ok(true),
      Answer::NotPurchased => Ok(false),
      Answer::Unreachable => Err(EntitlementError::Unreachable("connection refused".into())),
    }
  }
}
