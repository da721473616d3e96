//! Threat Log - SQLite Detection Store
//!
//! Persists non-benign detections and the running flow counter, and
//! aggregates them into the dashboard statistics.

pub mod store;


pub use store::{ThreatRow, ThreatStats, ThreatStore, DEFAULT_RECENT_LIMIT};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    /// Row holds a value the schema allows but the types do not
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "StoreError: io: {}", e),
            StoreError::Sqlite(e) => write!(f, "StoreError: sqlite: {}", e),
            StoreError::Corrupt(msg) => write!(f, "StoreError: corrupt row: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}
