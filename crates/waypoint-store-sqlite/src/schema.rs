//! SQL schema for the Waypoint SQLite store.
//!
//! Executed once at connection startup. Later migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tours (
    tour_id      TEXT PRIMARY KEY,
    author_id    INTEGER NOT NULL,
    name         TEXT NOT NULL,
    description  TEXT NOT NULL,
    difficulty   TEXT NOT NULL,             -- 'easy' | 'medium' | 'hard' | 'expert'
    tags         TEXT NOT NULL DEFAULT '[]',-- JSON array of strings
    status       TEXT NOT NULL,             -- 'draft' | 'published' | 'archived'
    price        REAL NOT NULL DEFAULT 0,
    distance_km  REAL NOT NULL DEFAULT 0,
    published_at TEXT,
    archived_at  TEXT,
    is_deleted   INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

-- `position` is the key point's 1-based order along the route. Gaps are
-- allowed after deletions.
CREATE TABLE IF NOT EXISTS key_points (
    key_point_id TEXT PRIMARY KEY,
    tour_id      TEXT NOT NULL REFERENCES tours(tour_id),
    name         TEXT NOT NULL,
    description  TEXT NOT NULL,
    latitude     REAL NOT NULL,
    longitude    REAL NOT NULL,
    image        TEXT,
    position     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tour_durations (
    duration_id    TEXT PRIMARY KEY,
    tour_id        TEXT NOT NULL REFERENCES tours(tour_id),
    transport_type TEXT NOT NULL,           -- 'walking' | 'bicycle' | 'car'
    minutes        INTEGER NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tour_executions (
    execution_id         TEXT PRIMARY KEY,
    tour_id              TEXT NOT NULL REFERENCES tours(tour_id),
    tourist_id           INTEGER NOT NULL,
    status               TEXT NOT NULL,     -- 'started' | 'completed' | 'abandoned'
    start_time           TEXT NOT NULL,
    end_time             TEXT,
    last_activity        TEXT NOT NULL,
    completed_key_points TEXT NOT NULL DEFAULT '[]', -- JSON array of key point ids
    starting_latitude    REAL NOT NULL,
    starting_longitude   REAL NOT NULL
);

-- At most one started execution per (tourist, tour).
CREATE UNIQUE INDEX IF NOT EXISTS executions_one_active_idx
    ON tour_executions(tourist_id, tour_id) WHERE status = 'started';

CREATE INDEX IF NOT EXISTS tours_author_idx      ON tours(author_id);
CREATE INDEX IF NOT EXISTS tours_status_idx      ON tours(status);
CREATE INDEX IF NOT EXISTS key_points_tour_idx   ON key_points(tour_id, position);
CREATE INDEX IF NOT EXISTS durations_tour_idx    ON tour_durations(tour_id);
CREATE INDEX IF NOT EXISTS executions_tour_idx   ON tour_executions(tour_id, start_time);

PRAGMA user_version = 1;
";
