//! Threat Types
//!
//! Core types for threat classification. No logic beyond conversions.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// THREAT CLASSIFICATION
// ============================================================================

/// Fixed label set the model is trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatClass {
    Benign,
    Cryptolocker,
    Locky,
    Ransomware,
    WannaCry,
}

impl ThreatClass {
    /// All classes in label-encoder order (sorted by name)
    pub const ALL: [ThreatClass; 5] = [
        ThreatClass::Benign,
        ThreatClass::Cryptolocker,
        ThreatClass::Locky,
        ThreatClass::Ransomware,
        ThreatClass::WannaCry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatClass::Benign => "Benign",
            ThreatClass::Cryptolocker => "Cryptolocker",
            ThreatClass::Locky => "Locky",
            ThreatClass::Ransomware => "Ransomware",
            ThreatClass::WannaCry => "WannaCry",
        }
    }

    pub fn is_benign(&self) -> bool {
        matches!(self, ThreatClass::Benign)
    }

    pub fn status(&self) -> ThreatStatus {
        if self.is_benign() {
            ThreatStatus::Benign
        } else {
            ThreatStatus::Blocked
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ThreatClass::Benign => "#10b981",       // Green
            ThreatClass::Cryptolocker => "#f59e0b", // Amber
            ThreatClass::Locky => "#8b5cf6",        // Violet
            ThreatClass::Ransomware => "#ef4444",   // Red
            ThreatClass::WannaCry => "#ec4899",     // Pink
        }
    }
}

impl std::fmt::Display for ThreatClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Label that is not part of the fixed class set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownThreatClass(pub String);

impl std::fmt::Display for UnknownThreatClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown threat class: {:?}", self.0)
    }
}

impl std::error::Error for UnknownThreatClass {}

impl FromStr for ThreatClass {
    type Err = UnknownThreatClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ThreatClass::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownThreatClass(s.to_string()))
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatStatus {
    Blocked,
    Benign,
}

impl ThreatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatStatus::Blocked => "BLOCKED",
            ThreatStatus::Benign => "BENIGN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownThreatStatus(pub String);

impl std::fmt::Display for UnknownThreatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown threat status: {:?}", self.0)
    }
}

impl std::error::Error for UnknownThreatStatus {}

impl FromStr for ThreatStatus {
    type Err = UnknownThreatStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLOCKED" => Ok(ThreatStatus::Blocked),
            "BENIGN" => Ok(ThreatStatus::Benign),
            other => Err(UnknownThreatStatus(other.to_string())),
        }
    }
}

// ============================================================================
// DETECTION
// ============================================================================

/// One scored flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatDetection {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_ip: String,
    pub dest_ip: String,
    pub threat_type: ThreatClass,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub status: ThreatStatus,
    /// "gcn" or "fallback"
    pub method: String,
}

impl ThreatDetection {
    pub fn is_threat(&self) -> bool {
        !self.threat_type.is_benign()
    }
}

/// Dashboard row for a detection (`new_threat` payload)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendThreat {
    pub timestamp: String,
    pub source_ip: String,
    pub dest_ip: String,
    pub threat_type: String,
    /// Whole percent, e.g. "87%"
    pub confidence: String,
    pub status: String,
}

impl From<&ThreatDetection> for FrontendThreat {
    fn from(d: &ThreatDetection) -> Self {
        Self {
            timestamp: d.timestamp.to_rfc3339(),
            source_ip: d.source_ip.clone(),
            dest_ip: d.dest_ip.clone(),
            threat_type: d.threat_type.as_str().to_string(),
            confidence: format!("{:.0}%", d.confidence * 100.0),
            status: d.status.as_str().to_string(),
        }
    }
}
