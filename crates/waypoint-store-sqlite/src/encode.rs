//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so they sort
//! lexically. Tags and completed key point ids are stored as compact JSON
//! arrays. UUIDs are stored as hyphenated lowercase strings.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;
use waypoint_core::{
  UserId,
  execution::{ExecutionStatus, TourExecution},
  tour::{Difficulty, KeyPoint, Tour, TourDuration, TourStatus, TransportType},
};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enumerations ────────────────────────────────────────────────────────────

fn unknown(column: &'static str, value: &str) -> Error {
  Error::UnknownVariant { column, value: value.to_owned() }
}

pub fn encode_difficulty(d: Difficulty) -> &'static str {
  match d {
    Difficulty::Easy => "easy",
    Difficulty::Medium => "medium",
    Difficulty::Hard => "hard",
    Difficulty::Expert => "expert",
  }
}

pub fn decode_difficulty(s: &str) -> Result<Difficulty> {
  match s {
    "easy" => Ok(Difficulty::Easy),
    "medium" => Ok(Difficulty::Medium),
    "hard" => Ok(Difficulty::Hard),
    "expert" => Ok(Difficulty::Expert),
    other => Err(unknown("difficulty", other)),
  }
}

pub fn encode_tour_status(s: TourStatus) -> &'static str { s.as_str() }

pub fn decode_tour_status(s: &str) -> Result<TourStatus> {
  match s {
    "draft" => Ok(TourStatus::Draft),
    "published" => Ok(TourStatus::Published),
    "archived" => Ok(TourStatus::Archived),
    other => Err(unknown("tour status", other)),
  }
}

pub fn encode_transport(t: TransportType) -> &'static str {
  match t {
    TransportType::Walking => "walking",
    TransportType::Bicycle => "bicycle",
    TransportType::Car => "car",
  }
}

pub fn decode_transport(s: &str) -> Result<TransportType> {
  match s {
    "walking" => Ok(TransportType::Walking),
    "bicycle" => Ok(TransportType::Bicycle),
    "car" => Ok(TransportType::Car),
    other => Err(unknown("transport type", other)),
  }
}

pub fn encode_execution_status(s: ExecutionStatus) -> &'static str {
  match s {
    ExecutionStatus::Started => "started",
    ExecutionStatus::Completed => "completed",
    ExecutionStatus::Abandoned => "abandoned",
  }
}

pub fn decode_execution_status(s: &str) -> Result<ExecutionStatus> {
  match s {
    "started" => Ok(ExecutionStatus::Started),
    "completed" => Ok(ExecutionStatus::Completed),
    "abandoned" => Ok(ExecutionStatus::Abandoned),
    other => Err(unknown("execution status", other)),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_tags(tags: &[String]) -> Result<String> { Ok(serde_json::to_string(tags)?) }

pub fn decode_tags(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

pub fn encode_completed(ids: &BTreeSet<Uuid>) -> Result<String> {
  Ok(serde_json::to_string(ids)?)
}

pub fn decode_completed(s: &str) -> Result<BTreeSet<Uuid>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const TOUR_COLUMNS: &str = "tour_id, author_id, name, description, difficulty, tags, \
   status, price, distance_km, published_at, archived_at, is_deleted, created_at";

/// Raw values read directly from a `tours` row.
pub struct RawTour {
  pub tour_id:      String,
  pub author_id:    UserId,
  pub name:         String,
  pub description:  String,
  pub difficulty:   String,
  pub tags:         String,
  pub status:       String,
  pub price:        f64,
  pub distance_km:  f64,
  pub published_at: Option<String>,
  pub archived_at:  Option<String>,
  pub is_deleted:   bool,
  pub created_at:   String,
}

impl RawTour {
  /// Map a row selected with [`TOUR_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tour_id:      row.get(0)?,
      author_id:    row.get(1)?,
      name:         row.get(2)?,
      description:  row.get(3)?,
      difficulty:   row.get(4)?,
      tags:         row.get(5)?,
      status:       row.get(6)?,
      price:        row.get(7)?,
      distance_km:  row.get(8)?,
      published_at: row.get(9)?,
      archived_at:  row.get(10)?,
      is_deleted:   row.get(11)?,
      created_at:   row.get(12)?,
    })
  }

  pub fn into_tour(self) -> Result<Tour> {
    Ok(Tour {
      tour_id:      decode_uuid(&self.tour_id)?,
      author_id:    self.author_id,
      name:         self.name,
      description:  self.description,
      difficulty:   decode_difficulty(&self.difficulty)?,
      tags:         decode_tags(&self.tags)?,
      status:       decode_tour_status(&self.status)?,
      price:        self.price,
      distance_km:  self.distance_km,
      published_at: decode_opt_dt(self.published_at)?,
      archived_at:  decode_opt_dt(self.archived_at)?,
      is_deleted:   self.is_deleted,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const KEY_POINT_COLUMNS: &str =
  "key_point_id, tour_id, name, description, latitude, longitude, image, position";

/// Raw values read directly from a `key_points` row.
pub struct RawKeyPoint {
  pub key_point_id: String,
  pub tour_id:      String,
  pub name:         String,
  pub description:  String,
  pub latitude:     f64,
  pub longitude:    f64,
  pub image:        Option<String>,
  pub position:     u32,
}

impl RawKeyPoint {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      key_point_id: row.get(0)?,
      tour_id:      row.get(1)?,
      name:         row.get(2)?,
      description:  row.get(3)?,
      latitude:     row.get(4)?,
      longitude:    row.get(5)?,
      image:        row.get(6)?,
      position:     row.get(7)?,
    })
  }

  pub fn into_key_point(self) -> Result<KeyPoint> {
    Ok(KeyPoint {
      key_point_id: decode_uuid(&self.key_point_id)?,
      tour_id:      decode_uuid(&self.tour_id)?,
      name:         self.name,
      description:  self.description,
      latitude:     self.latitude,
      longitude:    self.longitude,
      image:        self.image,
      order:        self.position,
    })
  }
}

pub const DURATION_COLUMNS: &str = "duration_id, tour_id, transport_type, minutes, created_at";

/// Raw values read directly from a `tour_durations` row.
pub struct RawDuration {
  pub duration_id:    String,
  pub tour_id:        String,
  pub transport_type: String,
  pub minutes:        u32,
  pub created_at:     String,
}

impl RawDuration {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      duration_id:    row.get(0)?,
      tour_id:        row.get(1)?,
      transport_type: row.get(2)?,
      minutes:        row.get(3)?,
      created_at:     row.get(4)?,
    })
  }

  pub fn into_duration(self) -> Result<TourDuration> {
    Ok(TourDuration {
      duration_id:    decode_uuid(&self.duration_id)?,
      tour_id:        decode_uuid(&self.tour_id)?,
      transport_type: decode_transport(&self.transport_type)?,
      minutes:        self.minutes,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub const EXECUTION_COLUMNS: &str = "execution_id, tour_id, tourist_id, status, start_time, \
   end_time, last_activity, completed_key_points, starting_latitude, starting_longitude";

/// Raw values read directly from a `tour_executions` row.
pub struct RawExecution {
  pub execution_id:         String,
  pub tour_id:              String,
  pub tourist_id:           UserId,
  pub status:               String,
  pub start_time:           String,
  pub end_time:             Option<String>,
  pub last_activity:        String,
  pub completed_key_points: String,
  pub starting_latitude:    f64,
  pub starting_longitude:   f64,
}

impl RawExecution {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      execution_id:         row.get(0)?,
      tour_id:              row.get(1)?,
      tourist_id:           row.get(2)?,
      status:               row.get(3)?,
      start_time:           row.get(4)?,
      end_time:             row.get(5)?,
      last_activity:        row.get(6)?,
      completed_key_points: row.get(7)?,
      starting_latitude:    row.get(8)?,
      starting_longitude:   row.get(9)?,
    })
  }

  pub fn into_execution(self) -> Result<TourExecution> {
    Ok(TourExecution {
      execution_id:         decode_uuid(&self.execution_id)?,
      tour_id:              decode_uuid(&self.tour_id)?,
      tourist_id:           self.tourist_id,
      status:               decode_execution_status(&self.status)?,
      start_time:           decode_dt(&self.start_time)?,
      end_time:             decode_opt_dt(self.end_time)?,
      last_activity:        decode_dt(&self.last_activity)?,
      completed_key_points: decode_completed(&self.completed_key_points)?,
      starting_latitude:    self.starting_latitude,
      starting_longitude:   self.starting_longitude,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_are_fixed_width() {
    let whole = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z").unwrap().with_timezone(&Utc);
    let fractional = whole + chrono::Duration::nanoseconds(5);

    let a = encode_dt(whole);
    let b = encode_dt(fractional);
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap(), fractional);
  }

  #[test]
  fn unknown_status_is_reported() {
    let err = decode_tour_status("retired").unwrap_err();
    assert!(matches!(err, Error::UnknownVariant { column: "tour status", .. }));
  }
}
