//! Sample persistence over an embedded SQLite file.
//!
//! One table, append-only from the collector's point of view. WAL journal
//! mode lets the single writer share the file with any number of readers
//! (the live dashboard and the analysis viewer) without readers observing
//! partial rows.

use std::path::Path;

use chrono::Duration;
use rusqlite::{Connection, OpenFlags, params};

use crate::sample::Sample;

/// Default database file name, shared by both binaries.
pub const DEFAULT_DB_NAME: &str = "system_metrics.db";

pub static CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS samples (
      timestamp      INTEGER PRIMARY KEY,  /* Unix milliseconds, strictly increasing. */
      cpu_percent    REAL NOT NULL,
      ram_percent    REAL NOT NULL,
      gpu_percent    REAL,                 /* NULL when no GPU sensor is readable.    */
      disk_read_bps  REAL NOT NULL,
      disk_write_bps REAL NOT NULL
    )";

pub static COLUMNS: &[&str] = &[
    "timestamp",
    "cpu_percent",
    "ram_percent",
    "gpu_percent",
    "disk_read_bps",
    "disk_write_bps",
];

/// Storage failure.
#[derive(Debug)]
pub enum StoreError {
    /// The database file could not be created or opened. Fatal at startup.
    Open {
        path: String,
        source: rusqlite::Error,
    },
    /// A statement failed after open (disk full, locked, corruption).
    Sql(rusqlite::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Open { path, source } => {
                write!(f, "cannot open database '{}': {}", path, source)
            }
            StoreError::Sql(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Open { source, .. } => Some(source),
            StoreError::Sql(e) => Some(e),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sql(e)
    }
}

/// Named relative time window for historical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    LastHour,
    LastDay,
    LastWeek,
    /// Everything stored, no lower bound.
    All,
}

impl Window {
    /// The window length, or `None` for [`Window::All`].
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Window::LastHour => Some(Duration::hours(1)),
            Window::LastDay => Some(Duration::days(1)),
            Window::LastWeek => Some(Duration::weeks(1)),
            Window::All => None,
        }
    }

    /// Human-readable label for titles and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Window::LastHour => "last hour",
            Window::LastDay => "last day",
            Window::LastWeek => "last week",
            Window::All => "all",
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" | "h" => Ok(Window::LastHour),
            "day" | "d" => Ok(Window::LastDay),
            "week" | "w" => Ok(Window::LastWeek),
            "all" | "a" => Ok(Window::All),
            other => Err(format!(
                "unknown window '{}', expected hour, day, week or all",
                other
            )),
        }
    }
}

/// Append-only table of timestamped samples in a SQLite file.
#[derive(Debug)]
pub struct SampleStore {
    conn: Connection,
}

impl SampleStore {
    /// Opens (creating if missing) the database and bootstraps the schema.
    /// Idempotent: repeated launches against the same file never fail or
    /// duplicate schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        conn.execute_batch(CREATE_TABLE_SQL)?;

        Ok(Self { conn })
    }

    /// Opens an existing database read-only (the analysis path).
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;

        conn.execute_batch("PRAGMA busy_timeout=5000;")?;

        Ok(Self { conn })
    }

    /// Inserts one sample. Each append is atomic from a reader's
    /// perspective.
    pub fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO samples (timestamp, cpu_percent, ram_percent, gpu_percent, \
             disk_read_bps, disk_write_bps) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sample.timestamp_ms,
                sample.cpu_percent,
                sample.ram_percent,
                sample.gpu_percent,
                sample.disk_read_bps,
                sample.disk_write_bps,
            ],
        )?;
        Ok(())
    }

    /// Returns all samples with `start_ms <= timestamp <= end_ms`, ordered
    /// by ascending timestamp. An empty range yields an empty vector, never
    /// an error.
    pub fn query_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Sample>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM samples WHERE timestamp >= ?1 AND timestamp <= ?2 \
             ORDER BY timestamp ASC",
            COLUMNS.join(", ")
        ))?;
        let samples = stmt
            .query_map(params![start_ms, end_ms], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(samples)
    }

    /// Convenience over [`query_range`](Self::query_range): computes
    /// `start = now - window` and delegates. [`Window::All`] has no lower
    /// bound.
    pub fn query_relative(&self, window: Window, now_ms: i64) -> Result<Vec<Sample>, StoreError> {
        let start_ms = match window.duration() {
            Some(d) => now_ms.saturating_sub(d.num_milliseconds()),
            None => i64::MIN,
        };
        self.query_range(start_ms, now_ms)
    }

    /// The most recent persisted timestamp, if any. The collector uses this
    /// to keep timestamps strictly increasing across restarts.
    pub fn last_timestamp_ms(&self) -> Result<Option<i64>, StoreError> {
        let max = self
            .conn
            .query_row("SELECT MAX(timestamp) FROM samples", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?;
        Ok(max)
    }

    /// Number of stored samples.
    pub fn len(&self) -> Result<u64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM samples", [], |row| {
                row.get::<_, u64>(0)
            })?;
        Ok(count)
    }

    fn from_row(row: &rusqlite::Row) -> Result<Sample, rusqlite::Error> {
        Ok(Sample {
            timestamp_ms: row.get(0)?,
            cpu_percent: row.get(1)?,
            ram_percent: row.get(2)?,
            gpu_percent: row.get::<_, Option<f64>>(3)?,
            disk_read_bps: row.get(4)?,
            disk_write_bps: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(ts: i64) -> Sample {
        Sample {
            timestamp_ms: ts,
            cpu_percent: 10.0,
            ram_percent: 40.0,
            gpu_percent: Some(5.0),
            disk_read_bps: 1024.0,
            disk_write_bps: 2048.0,
        }
    }

    fn open_temp() -> (TempDir, SampleStore) {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path().join(DEFAULT_DB_NAME)).unwrap();
        (dir, store)
    }

    #[test]
    fn open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DB_NAME);

        {
            let store = SampleStore::open(&path).unwrap();
            store.append(&sample(1)).unwrap();
        }
        // Re-open against the same file: no failure, no duplicate schema,
        // existing data intact.
        let store = SampleStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn open_fails_on_unwritable_path() {
        let err = SampleStore::open("/nonexistent-dir/metrics.db").unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn append_and_query_range_inclusive_ascending() {
        let (_dir, store) = open_temp();
        for ts in [100, 200, 300, 400] {
            store.append(&sample(ts)).unwrap();
        }

        let got = store.query_range(200, 300).unwrap();
        assert_eq!(
            got.iter().map(|s| s.timestamp_ms).collect::<Vec<_>>(),
            vec![200, 300]
        );
    }

    #[test]
    fn query_range_is_idempotent() {
        let (_dir, store) = open_temp();
        for ts in [100, 200, 300] {
            store.append(&sample(ts)).unwrap();
        }

        let first = store.query_range(0, 1000).unwrap();
        let second = store.query_range(0, 1000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_range_yields_empty_vec() {
        let (_dir, store) = open_temp();
        store.append(&sample(100)).unwrap();

        let got = store.query_range(500, 1000).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn gpu_null_round_trips() {
        let (_dir, store) = open_temp();
        let mut s = sample(100);
        s.gpu_percent = None;
        store.append(&s).unwrap();

        let got = store.query_range(0, 1000).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].gpu_percent, None);
    }

    #[test]
    fn query_relative_window_excludes_old_samples() {
        let (_dir, store) = open_temp();
        let now_ms = 10 * 3600 * 1000;
        // Two hours old: outside the last-hour window.
        store.append(&sample(now_ms - 2 * 3600 * 1000)).unwrap();

        let got = store.query_relative(Window::LastHour, now_ms).unwrap();
        assert!(got.is_empty());

        let all = store.query_relative(Window::All, now_ms).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn query_relative_includes_window_boundary() {
        let (_dir, store) = open_temp();
        let now_ms = 10 * 3600 * 1000;
        let boundary = now_ms - Duration::hours(1).num_milliseconds();
        store.append(&sample(boundary)).unwrap();

        let got = store.query_relative(Window::LastHour, now_ms).unwrap();
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn last_timestamp_tracks_max() {
        let (_dir, store) = open_temp();
        assert_eq!(store.last_timestamp_ms().unwrap(), None);

        store.append(&sample(100)).unwrap();
        store.append(&sample(300)).unwrap();
        assert_eq!(store.last_timestamp_ms().unwrap(), Some(300));
    }

    #[test]
    fn duplicate_timestamp_is_rejected() {
        let (_dir, store) = open_temp();
        store.append(&sample(100)).unwrap();
        assert!(store.append(&sample(100)).is_err());
    }

    #[test]
    fn read_only_open_sees_writer_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DB_NAME);

        let writer = SampleStore::open(&path).unwrap();
        writer.append(&sample(100)).unwrap();

        let reader = SampleStore::open_read_only(&path).unwrap();
        assert_eq!(reader.query_range(0, 1000).unwrap().len(), 1);
        assert!(reader.append(&sample(200)).is_err());
    }

    #[test]
    fn read_only_open_fails_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = SampleStore::open_read_only(dir.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn window_parsing() {
        use std::str::FromStr;
        assert_eq!(Window::from_str("hour").unwrap(), Window::LastHour);
        assert_eq!(Window::from_str("d").unwrap(), Window::LastDay);
        assert_eq!(Window::from_str("WEEK").unwrap(), Window::LastWeek);
        assert_eq!(Window::from_str("all").unwrap(), Window::All);
        assert!(Window::from_str("fortnight").is_err());
    }
}
