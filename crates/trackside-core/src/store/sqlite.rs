//! SQLite-backed sample store

use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{LapIndex, SampleStore, StoreError};
use crate::sample::{PositionPoint, Sample, SeriesPoint};

const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;

    CREATE TABLE IF NOT EXISTS samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        t_ms INTEGER NOT NULL,
        lap INTEGER NOT NULL,
        V REAL,
        A REAL,
        Ah REAL,
        mph REAL,
        torque REAL,
        lat REAL,
        lon REAL
    );

    CREATE INDEX IF NOT EXISTS idx_samples_lap_t ON samples(lap, t_ms);
"#;

/// Sample store in a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::init(conn).inspect(|_| {
            tracing::info!(path = %path.display(), "Sample store opened");
        })
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }
}

impl SampleStore for SqliteStore {
    fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO samples (t_ms, lap, V, A, Ah, mph, torque, lat, lon)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                sample.timestamp_ms,
                sample.lap,
                sample.voltage,
                sample.current,
                sample.amp_hours,
                sample.speed,
                sample.torque,
                sample.latitude,
                sample.longitude,
            ],
        )?;
        Ok(())
    }

    fn list_laps(&self) -> Result<LapIndex, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT lap FROM samples ORDER BY lap ASC")?;
        let laps = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|lap| lap_from_column(lap?))
            .collect::<Result<Vec<u32>, StoreError>>()?;

        // Sorted ascending, so the last entry is MAX(lap)
        let latest = laps.last().copied().unwrap_or(0);
        Ok(LapIndex { laps, latest })
    }

    fn lap_series(&self, lap: u32) -> Result<Vec<SeriesPoint>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t_ms, V, A, mph, torque
             FROM samples
             WHERE lap = ?1
             ORDER BY t_ms ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![lap], |row| {
            Ok(SeriesPoint {
                timestamp_ms: row.get(0)?,
                voltage: row.get(1)?,
                current: row.get(2)?,
                speed: row.get(3)?,
                torque: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn lap_positions(&self, lap: u32) -> Result<Vec<PositionPoint>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t_ms, lat, lon
             FROM samples
             WHERE lap = ?1 AND lat IS NOT NULL AND lon IS NOT NULL
             ORDER BY t_ms ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![lap], |row| {
            Ok(PositionPoint {
                timestamp_ms: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn sample_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn lap_from_column(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::OutOfRange {
        column: "lap",
        value,
    })
}
