use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;
use crate::logic::threat::{ThreatClass, ThreatDetection, ThreatStatus};

pub const DEFAULT_RECENT_LIMIT: usize = 50;

const TOTAL_FLOWS: &str = "total_flows";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS threats (
    id TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    source_ip TEXT NOT NULL,
    dest_ip TEXT NOT NULL,
    threat_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    status TEXT NOT NULL,
    method TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threats_timestamp ON threats(timestamp);
CREATE INDEX IF NOT EXISTS idx_threats_type ON threats(threat_type);

CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

/// Aggregates served on `stats_update` and `/api/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatStats {
    pub total_flows: u64,
    pub threats_detected: u64,
    pub threats_blocked: u64,
    /// Mean confidence of logged threats, percent, one decimal
    pub detection_rate: f64,
    pub threat_types: BTreeMap<String, u64>,
}

/// Raw `threats` row before type conversion
#[derive(Debug, Clone)]
pub struct ThreatRow {
    pub id: String,
    pub timestamp: String,
    pub source_ip: String,
    pub dest_ip: String,
    pub threat_type: String,
    pub confidence: f64,
    pub status: String,
    pub method: String,
}

impl ThreatRow {
    fn into_detection(self) -> Result<ThreatDetection, StoreError> {
        let corrupt = |field: &str, value: &str| StoreError::Corrupt(format!("{} {:?} in {}", field, value, self.id));

        let id = Uuid::parse_str(&self.id).map_err(|_| corrupt("id", &self.id))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|_| corrupt("timestamp", &self.timestamp))?
            .with_timezone(&Utc);
        let threat_type = self
            .threat_type
            .parse::<ThreatClass>()
            .map_err(|_| corrupt("threat_type", &self.threat_type))?;
        let status = self
            .status
            .parse::<ThreatStatus>()
            .map_err(|_| corrupt("status", &self.status))?;

        Ok(ThreatDetection {
            id,
            timestamp,
            source_ip: self.source_ip,
            dest_ip: self.dest_ip,
            threat_type,
            confidence: self.confidence as f32,
            status,
            method: self.method,
        })
    }
}

/// SQLite-backed threat log
///
/// One connection behind a mutex; every call is a short statement.
pub struct ThreatStore {
    conn: Mutex<Connection>,
}

impl ThreatStore {
    /// Open (or create) the database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        log::info!("Threat database: {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Count one scored flow, benign or not
    pub fn record_flow(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO counters (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1",
            params![TOTAL_FLOWS],
        )?;
        let total: i64 = conn.query_row(
            "SELECT value FROM counters WHERE name = ?1",
            params![TOTAL_FLOWS],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    /// Persist a detection; benign ones are not logged
    pub fn log_threat(&self, detection: &ThreatDetection) -> Result<bool, StoreError> {
        if !detection.is_threat() {
            return Ok(false);
        }

        self.conn.lock().execute(
            "INSERT INTO threats (id, timestamp, source_ip, dest_ip, threat_type, confidence, status, method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                detection.id.to_string(),
                detection.timestamp.to_rfc3339(),
                detection.source_ip,
                detection.dest_ip,
                detection.threat_type.as_str(),
                detection.confidence as f64,
                detection.status.as_str(),
                detection.method,
            ],
        )?;
        Ok(true)
    }

    pub fn stats(&self) -> Result<ThreatStats, StoreError> {
        let conn = self.conn.lock();

        let total_flows: i64 = conn
            .query_row(
                "SELECT COALESCE((SELECT value FROM counters WHERE name = ?1), 0)",
                params![TOTAL_FLOWS],
                |row| row.get(0),
            )?;

        let (threats_detected, threats_blocked, mean_confidence): (i64, i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = ?1 THEN 1 ELSE 0 END), 0),
                    AVG(confidence)
             FROM threats",
            params![ThreatStatus::Blocked.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut threat_types = BTreeMap::new();
        let mut stmt = conn.prepare("SELECT threat_type, COUNT(*) FROM threats GROUP BY threat_type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (name, count) = row?;
            threat_types.insert(name, count.max(0) as u64);
        }

        Ok(ThreatStats {
            total_flows: total_flows.max(0) as u64,
            threats_detected: threats_detected.max(0) as u64,
            threats_blocked: threats_blocked.max(0) as u64,
            detection_rate: mean_confidence.map(|c| (c * 1000.0).round() / 10.0).unwrap_or(0.0),
            threat_types,
        })
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<ThreatDetection>, StoreError> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, source_ip, dest_ip, threat_type, confidence, status, method
                 FROM threats ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
            )?;
            let mapped = stmt.query_map(params![limit as i64], |row| {
                Ok(ThreatRow {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    source_ip: row.get(2)?,
                    dest_ip: row.get(3)?,
                    threat_type: row.get(4)?,
                    confidence: row.get(5)?,
                    status: row.get(6)?,
                    method: row.get(7)?,
                })
            })?;
            mapped.collect::<Result<Vec<_>, _>>()?
        };

        rows.into_iter().map(ThreatRow::into_detection).collect()
    }
}
