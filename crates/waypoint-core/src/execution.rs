//! Tour execution types: one tourist's run along a tour's route.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{UserId, geo::Coordinate};

/// Status of a tour execution. `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
  Started,
  Completed,
  Abandoned,
}

impl ExecutionStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Started) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourExecution {
  pub execution_id:         Uuid,
  pub tour_id:              Uuid,
  pub tourist_id:           UserId,
  pub status:               ExecutionStatus,
  pub start_time:           DateTime<Utc>,
  /// Set only once the execution reaches a terminal status.
  pub end_time:             Option<DateTime<Utc>>,
  pub last_activity:        DateTime<Utc>,
  /// Grows monotonically; a key point id is never removed once added.
  pub completed_key_points: BTreeSet<Uuid>,
  pub starting_latitude:    f64,
  pub starting_longitude:   f64,
}

impl TourExecution {
  pub fn has_completed(&self, key_point_id: Uuid) -> bool {
    self.completed_key_points.contains(&key_point_id)
  }

  /// Move into a terminal status, stamping `end_time` and `last_activity`.
  pub fn finish(&mut self, status: ExecutionStatus, at: DateTime<Utc>) {
    self.status = status;
    self.end_time = Some(at);
    self.last_activity = at;
  }
}

/// Input to [`crate::store::TourStore::create_execution`]. The store assigns
/// the id and stamps `start_time` and `last_activity`.
#[derive(Debug, Clone, Copy)]
pub struct NewExecution {
  pub tour_id:    Uuid,
  pub tourist_id: UserId,
  pub start:      Coordinate,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_wire_format() {
    let json = serde_json::to_string(&ExecutionStatus::Abandoned).unwrap();
    assert_eq!(json, "\"ABANDONED\"");
  }

  #[test]
  fn only_started_is_not_terminal() {
    assert!(!ExecutionStatus::Started.is_terminal());
    assert!(ExecutionStatus::Completed.is_terminal());
    assert!(ExecutionStatus::Abandoned.is_terminal());
  }
}
