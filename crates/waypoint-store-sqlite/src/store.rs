//! [`SqliteStore`], the SQLite implementation of [`TourStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, ffi, types::Value};
use uuid::Uuid;
use waypoint_core::{
  UserId,
  execution::{ExecutionStatus, NewExecution, TourExecution},
  store::TourStore,
  tour::{
    KeyPoint, NewKeyPoint, NewTour, StatusTransition, Tour, TourDuration,
    TourStatus, TourView, TransportType,
  },
};

use crate::{
  Result,
  encode::{
    DURATION_COLUMNS, EXECUTION_COLUMNS, KEY_POINT_COLUMNS, RawDuration,
    RawExecution, RawKeyPoint, RawTour, TOUR_COLUMNS, encode_completed,
    encode_difficulty, encode_dt, encode_execution_status, encode_tags,
    encode_tour_status, encode_transport, encode_uuid,
  },
  error::Error,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Waypoint tour store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Column values for one `key_points` insert.
struct KeyPointRow {
  key_point_id: String,
  tour_id:      String,
  name:         String,
  description:  String,
  latitude:     f64,
  longitude:    f64,
  image:        Option<String>,
  position:     u32,
}

impl KeyPointRow {
  fn new(kp: &KeyPoint) -> Self {
    Self {
      key_point_id: encode_uuid(kp.key_point_id),
      tour_id:      encode_uuid(kp.tour_id),
      name:         kp.name.clone(),
      description:  kp.description.clone(),
      latitude:     kp.latitude,
      longitude:    kp.longitude,
      image:        kp.image.clone(),
      position:     kp.order,
    }
  }

  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO key_points (
         key_point_id, tour_id, name, description, latitude, longitude, image, position
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      rusqlite::params![
        self.key_point_id,
        self.tour_id,
        self.name,
        self.description,
        self.latitude,
        self.longitude,
        self.image,
        self.position,
      ],
    )?;
    Ok(())
  }
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

fn select_key_points(
  conn: &rusqlite::Connection,
  tour_id: &str,
) -> rusqlite::Result<Vec<RawKeyPoint>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {KEY_POINT_COLUMNS} FROM key_points WHERE tour_id = ?1 ORDER BY position, rowid"
  ))?;
  stmt
    .query_map(rusqlite::params![tour_id], RawKeyPoint::from_row)?
    .collect()
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Mark a tour deleted. The service never sets the flag itself; deleted
  /// tours only have to disappear from every lookup.
  #[cfg(test)]
  pub(crate) async fn soft_delete_tour(&self, tour_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(tour_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE tours SET is_deleted = 1 WHERE tour_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn select_tours(&self, filter: &'static str, param: Value) -> Result<Vec<Tour>> {
    let raws: Vec<RawTour> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TOUR_COLUMNS} FROM tours
           WHERE {filter} AND is_deleted = 0
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![param], RawTour::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTour::into_tour).collect()
  }

  async fn select_executions(
    &self,
    filter: &'static str,
    params: Vec<Value>,
  ) -> Result<Vec<TourExecution>> {
    let raws: Vec<RawExecution> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EXECUTION_COLUMNS} FROM tour_executions
           WHERE {filter}
           ORDER BY start_time, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawExecution::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawExecution::into_execution).collect()
  }
}

// ─── TourStore impl ──────────────────────────────────────────────────────────

impl TourStore for SqliteStore {
  type Error = Error;

  // ── Tours ─────────────────────────────────────────────────────────────────

  async fn create_tour(&self, author_id: UserId, input: NewTour) -> Result<TourView> {
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

    let id_str          = encode_uuid(tour.tour_id);
    let name            = tour.name.clone();
    let description     = tour.description.clone();
    let difficulty_str  = encode_difficulty(tour.difficulty);
    let tags_str        = encode_tags(&tour.tags)?;
    let status_str      = encode_tour_status(tour.status);
    let created_at_str  = encode_dt(tour.created_at);
    let rows: Vec<KeyPointRow> = key_points.iter().map(KeyPointRow::new).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO tours (
             tour_id, author_id, name, description, difficulty, tags,
             status, price, distance_km, is_deleted, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 0, ?8)",
          rusqlite::params![
            id_str,
            author_id,
            name,
            description,
            difficulty_str,
            tags_str,
            status_str,
            created_at_str,
          ],
        )?;
        for row in &rows {
          row.insert(&tx)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(TourView { tour, key_points, durations: vec![] })
  }

  async fn find_tour(&self, tour_id: Uuid) -> Result<Option<Tour>> {
    let id_str = encode_uuid(tour_id);

    let raw: Option<RawTour> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {TOUR_COLUMNS} FROM tours WHERE tour_id = ?1 AND is_deleted = 0"),
            rusqlite::params![id_str],
            RawTour::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawTour::into_tour).transpose()
  }

  async fn find_tour_view(&self, tour_id: Uuid) -> Result<Option<TourView>> {
    let id_str = encode_uuid(tour_id);

    let raw = self
      .conn
      .call(move |conn| {
        let Some(tour) = conn
          .query_row(
            &format!("SELECT {TOUR_COLUMNS} FROM tours WHERE tour_id = ?1 AND is_deleted = 0"),
            rusqlite::params![id_str],
            RawTour::from_row,
          )
          .optional()?
        else {
          return Ok(None);
        };

        let key_points = select_key_points(conn, &id_str)?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {DURATION_COLUMNS} FROM tour_durations WHERE tour_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let durations = stmt
          .query_map(rusqlite::params![id_str], RawDuration::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((tour, key_points, durations)))
      })
      .await?;

    let Some((tour, key_points, durations)) = raw else {
      return Ok(None);
    };
    Ok(Some(TourView {
      tour:       tour.into_tour()?,
      key_points: key_points
        .into_iter()
        .map(RawKeyPoint::into_key_point)
        .collect::<Result<_>>()?,
      durations:  durations
        .into_iter()
        .map(RawDuration::into_duration)
        .collect::<Result<_>>()?,
    }))
  }

  async fn tours_by_author(&self, author_id: UserId) -> Result<Vec<Tour>> {
    self.select_tours("author_id = ?1", Value::Integer(author_id)).await
  }

  async fn published_tours(&self) -> Result<Vec<Tour>> {
    self
      .select_tours("status = ?1", Value::Text(encode_tour_status(TourStatus::Published).into()))
      .await
  }

  async fn update_tour_distance(&self, tour_id: Uuid, distance_km: f64) -> Result<()> {
    let id_str = encode_uuid(tour_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE tours SET distance_km = ?2 WHERE tour_id = ?1",
          rusqlite::params![id_str, distance_km],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_tour_status(&self, tour_id: Uuid, transition: StatusTransition) -> Result<()> {
    let id_str           = encode_uuid(tour_id);
    let status_str       = encode_tour_status(transition.status);
    let published_at_str = transition.published_at.map(encode_dt);
    let archived_at_str  = transition.archived_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE tours SET status = ?2, published_at = ?3, archived_at = ?4 WHERE tour_id = ?1",
          rusqlite::params![id_str, status_str, published_at_str, archived_at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Key points ────────────────────────────────────────────────────────────

  async fn create_key_point(&self, tour_id: Uuid, order: u32, input: NewKeyPoint) -> Result<KeyPoint> {
    let kp = new_key_point(tour_id, order, input);
    let row = KeyPointRow::new(&kp);

    self
      .conn
      .call(move |conn| {
        row.insert(conn)?;
        Ok(())
      })
      .await?;
    Ok(kp)
  }

  async fn find_key_point(&self, key_point_id: Uuid) -> Result<Option<KeyPoint>> {
    let id_str = encode_uuid(key_point_id);

    let raw: Option<RawKeyPoint> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {KEY_POINT_COLUMNS} FROM key_points WHERE key_point_id = ?1"),
            rusqlite::params![id_str],
            RawKeyPoint::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawKeyPoint::into_key_point).transpose()
  }

  async fn key_points_by_tour(&self, tour_id: Uuid) -> Result<Vec<KeyPoint>> {
    let id_str = encode_uuid(tour_id);

    let raws = self
      .conn
      .call(move |conn| Ok(select_key_points(conn, &id_str)?))
      .await?;

    raws.into_iter().map(RawKeyPoint::into_key_point).collect()
  }

  async fn update_key_point(&self, key_point: KeyPoint) -> Result<()> {
    let row = KeyPointRow::new(&key_point);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE key_points
           SET name = ?2, description = ?3, latitude = ?4, longitude = ?5,
               image = ?6, position = ?7
           WHERE key_point_id = ?1",
          rusqlite::params![
            row.key_point_id,
            row.name,
            row.description,
            row.latitude,
            row.longitude,
            row.image,
            row.position,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_key_point(&self, key_point_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(key_point_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM key_points WHERE key_point_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Durations ─────────────────────────────────────────────────────────────

  async fn create_duration(
    &self,
    tour_id: Uuid,
    transport_type: TransportType,
    minutes: u32,
  ) -> Result<TourDuration> {
    let duration = TourDuration {
      duration_id: Uuid::new_v4(),
      tour_id,
      transport_type,
      minutes,
      created_at: Utc::now(),
    };

    let id_str        = encode_uuid(duration.duration_id);
    let tour_id_str   = encode_uuid(tour_id);
    let transport_str = encode_transport(transport_type);
    let at_str        = encode_dt(duration.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tour_durations (duration_id, tour_id, transport_type, minutes, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, tour_id_str, transport_str, minutes, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(duration)
  }

  // ── Executions ────────────────────────────────────────────────────────────

  async fn create_execution(&self, input: NewExecution) -> Result<Option<TourExecution>> {
    let now = Utc::now();
    let execution = TourExecution {
      execution_id:         Uuid::new_v4(),
      tour_id:              input.tour_id,
      tourist_id:           input.tourist_id,
      status:               ExecutionStatus::Started,
      start_time:           now,
      end_time:             None,
      last_activity:        now,
      completed_key_points: BTreeSet::new(),
      starting_latitude:    input.start.latitude,
      starting_longitude:   input.start.longitude,
    };

    let id_str      = encode_uuid(execution.execution_id);
    let tour_id_str = encode_uuid(execution.tour_id);
    let tourist_id  = execution.tourist_id;
    let status_str  = encode_execution_status(execution.status);
    let now_str     = encode_dt(now);
    let completed   = encode_completed(&execution.completed_key_points)?;
    let (lat, lng)  = (execution.starting_latitude, execution.starting_longitude);

    let inserted = self
      .conn
      .call(move |conn| {
        let outcome = conn.execute(
          "INSERT INTO tour_executions (
             execution_id, tour_id, tourist_id, status, start_time, end_time,
             last_activity, completed_key_points, starting_latitude, starting_longitude
           ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?5, ?6, ?7, ?8)",
          rusqlite::params![id_str, tour_id_str, tourist_id, status_str, now_str, completed, lat, lng],
        );
        match outcome {
          Ok(_) => Ok(true),
          // The partial unique index on started executions rejected the row.
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      tracing::debug!(
        tour_id = %execution.tour_id,
        tourist_id,
        "started execution already exists"
      );
      return Ok(None);
    }
    Ok(Some(execution))
  }

  async fn find_execution(&self, execution_id: Uuid) -> Result<Option<TourExecution>> {
    let mut found = self
      .select_executions("execution_id = ?1", vec![Value::Text(encode_uuid(execution_id))])
      .await?;
    Ok(found.pop())
  }

  async fn find_active_execution(
    &self,
    tourist_id: UserId,
    tour_id: Uuid,
  ) -> Result<Option<TourExecution>> {
    let mut found = self
      .select_executions(
        "tourist_id = ?1 AND tour_id = ?2 AND status = ?3",
        vec![
          Value::Integer(tourist_id),
          Value::Text(encode_uuid(tour_id)),
          Value::Text(encode_execution_status(ExecutionStatus::Started).into()),
        ],
      )
      .await?;
    Ok(found.pop())
  }

  async fn executions_by_tour(&self, tour_id: Uuid) -> Result<Vec<TourExecution>> {
    self
      .select_executions("tour_id = ?1", vec![Value::Text(encode_uuid(tour_id))])
      .await
  }

  async fn update_execution(&self, execution: TourExecution) -> Result<bool> {
    let id_str            = encode_uuid(execution.execution_id);
    let status_str        = encode_execution_status(execution.status);
    let end_time_str      = execution.end_time.map(encode_dt);
    let last_activity_str = encode_dt(execution.last_activity);
    let completed         = encode_completed(&execution.completed_key_points)?;
    let started_str       = encode_execution_status(ExecutionStatus::Started);

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE tour_executions
           SET status = ?2, end_time = ?3, last_activity = ?4, completed_key_points = ?5
           WHERE execution_id = ?1 AND status = ?6",
          rusqlite::params![
            id_str,
            status_str,
            end_time_str,
            last_activity_str,
            completed,
            started_str
          ],
        )?;
        Ok(n)
      })
      .await?;
    Ok(changed > 0)
  }
}
