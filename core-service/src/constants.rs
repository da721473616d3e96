//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every value can be overridden through the environment.

use std::path::PathBuf;

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "PRATIRAKSHA-Lite";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default dashboard port
pub const DEFAULT_PORT: u16 = 5002;

/// Trained model checkpoint
pub const DEFAULT_MODEL_PATH: &str = "models/gcn_threat_detector.json";

/// Model metadata written next to the checkpoint
pub const DEFAULT_MODEL_INFO_PATH: &str = "models/model_info.json";

/// Balanced dataset, tried first by the trainer
pub const DEFAULT_DATASET_PATH: &str = "data/PRATIRAKSHA_ransomware_dataset_balanced.csv";

/// Raw dataset, used when the balanced one is missing
pub const FALLBACK_DATASET_PATH: &str = "data/PRATIRAKSHA_ransomware_dataset.csv";

/// Monitor delay window between two simulated detections (seconds)
pub const DEFAULT_MONITOR_MIN_DELAY_SECS: f64 = 23.0;
pub const DEFAULT_MONITOR_MAX_DELAY_SECS: f64 = 25.0;

/// Longest accepted monitor delay (seconds)
pub const MAX_MONITOR_DELAY_SECS: f64 = 3600.0;

/// Back-off after a failed monitor iteration (seconds)
pub const MONITOR_ERROR_BACKOFF_SECS: u64 = 2;

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get the model checkpoint path from environment or use default
pub fn get_model_path() -> PathBuf {
    std::env::var("MODEL_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH))
}

/// Get the model info path from environment or use default
pub fn get_model_info_path() -> PathBuf {
    std::env::var("MODEL_INFO_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_INFO_PATH))
}

/// Get the threat database path from environment or use default
///
/// Default lives in the local data directory, like the dataset logs.
pub fn get_database_path() -> PathBuf {
    std::env::var("DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pratiraksha")
                .join("threats.db")
        })
}

/// Get server port from environment or use default
pub fn get_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Get the monitor delay window from environment or use default
pub fn get_monitor_delay_window() -> (f64, f64) {
    delay_window(
        std::env::var("MONITOR_MIN_DELAY_SECS").ok().as_deref(),
        std::env::var("MONITOR_MAX_DELAY_SECS").ok().as_deref(),
    )
}

/// Parse a delay bound; anything outside 0..=MAX_MONITOR_DELAY_SECS is ignored
fn parse_delay(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && (0.0..=MAX_MONITOR_DELAY_SECS).contains(v))
        .unwrap_or(default)
}

fn delay_window(min: Option<&str>, max: Option<&str>) -> (f64, f64) {
    let min = parse_delay(min, DEFAULT_MONITOR_MIN_DELAY_SECS);
    let max = parse_delay(max, DEFAULT_MONITOR_MAX_DELAY_SECS);
    (min, max.max(min))
}

/// Check if the background monitor is enabled
pub fn is_monitor_enabled() -> bool {
    std::env::var("MONITOR_ENABLED")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}
