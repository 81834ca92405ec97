//! Sample Storage
//!
//! Append-only persistence of canonical samples with per-lap, time-ordered
//! retrieval.

mod error;
mod sqlite;

pub use error::StoreError;
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};

use crate::sample::{PositionPoint, Sample, SeriesPoint};

/// Distinct laps recorded so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapIndex {
    /// Lap numbers, ascending
    pub laps: Vec<u32>,
    /// Highest lap number, 0 when nothing is recorded
    pub latest: u32,
}

/// Append-only, lap-indexed sample storage.
///
/// Within a lap, reads are ordered by timestamp with ties broken by insertion
/// order. Implementations must allow one writer alongside concurrent readers.
pub trait SampleStore: Send + Sync {
    /// Durably record a sample
    fn append(&self, sample: &Sample) -> Result<(), StoreError>;

    /// List recorded laps
    fn list_laps(&self) -> Result<LapIndex, StoreError>;

    /// Electrical and speed series for one lap
    fn lap_series(&self, lap: u32) -> Result<Vec<SeriesPoint>, StoreError>;

    /// GPS track for one lap, skipping samples without a full fix
    fn lap_positions(&self, lap: u32) -> Result<Vec<PositionPoint>, StoreError>;

    /// Total number of recorded samples
    fn sample_count(&self) -> Result<u64, StoreError>;
}
