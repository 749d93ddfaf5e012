use crate::reading::{Reading, SensorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistence failure while writing or reading the snapshot file
///
/// Durability failures are reported to the caller but never roll back the
/// in-memory log; the pipeline keeps running on the in-memory state.
#[derive(Debug)]
pub enum PersistenceError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "store I/O error: {}", e),
            PersistenceError::Serialize(e) => write!(f, "store serialization error: {}", e),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialize(e)
    }
}

/// Snapshot written to disk on every append
#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    readings: Vec<Reading>,
    saved_at: i64,
}

/// Durable, size-bounded log of sensor readings
///
/// Append-only with oldest-first eviction once the cap is exceeded (a
/// sliding window over arrival order). Every append persists the full
/// snapshot synchronously before returning. Mutating calls must be
/// serialized by the owner; the runtime wraps the store in a mutex.
///
/// Reading timestamps are assigned at ingestion (see `reading::parse_payload`),
/// so every entry in the log carries an `observed_at`.
pub struct BoundedReadingStore {
    path: PathBuf,
    cap: usize,
    readings: VecDeque<Reading>,
}

impl BoundedReadingStore {
    /// Create an empty store without touching the filesystem
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap,
            readings: VecDeque::with_capacity(cap),
        }
    }

    /// Load a store from an existing snapshot file
    ///
    /// A missing file yields an empty store. A snapshot longer than the cap
    /// (e.g. after the cap was lowered) is trimmed to the newest entries.
    pub fn load(path: impl Into<PathBuf>, cap: usize) -> Result<Self, PersistenceError> {
        let path = path.into();

        if !Path::new(&path).exists() {
            log::info!("No existing reading snapshot found: {}", path.display());
            return Ok(Self::new(path, cap));
        }

        let json = fs::read_to_string(&path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&json)?;

        let mut readings: VecDeque<Reading> = snapshot.readings.into();
        while readings.len() > cap {
            readings.pop_front();
        }

        log::info!("Loaded {} readings from {}", readings.len(), path.display());
        Ok(Self { path, cap, readings })
    }

    /// Append a reading, evict past the cap, persist synchronously
    ///
    /// On a persistence failure the reading is kept in memory but the caller
    /// must treat it as not durably stored.
    pub fn append(&mut self, reading: Reading) -> Result<(), PersistenceError> {
        self.readings.push_back(reading);

        while self.readings.len() > self.cap {
            self.readings.pop_front();
        }

        self.persist()
    }

    /// The most recent `count` readings, oldest of the requested window first
    pub fn latest(&self, count: usize) -> Vec<Reading> {
        let skip = self.readings.len().saturating_sub(count);
        self.readings.iter().skip(skip).cloned().collect()
    }

    /// Newest-backward scan for the most recent reading of a kind
    pub fn latest_by_kind(&self, kind: &SensorKind) -> Option<&Reading> {
        self.readings.iter().rev().find(|r| &r.kind == kind)
    }

    /// All readings with `observed_at` in [start, end] inclusive, insertion order
    pub fn in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Reading> {
        self.readings
            .iter()
            .filter(|r| r.observed_at >= start && r.observed_at <= end)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        let snapshot = StoreSnapshot {
            readings: self.readings.iter().cloned().collect(),
            saved_at: Utc::now().timestamp(),
        };

        let json = serde_json::to_string(&snapshot)?;
        fs::write(&self.path, json)?;

        log::debug!("Persisted {} readings to {}", self.readings.len(), self.path.display());
        Ok(())
    }
}
