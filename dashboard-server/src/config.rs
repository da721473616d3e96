//! Configuration module

use std::env;
use std::path::PathBuf;

use pratiraksha_core::constants;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Trained checkpoint; the fallback scorer is used when it is missing
    pub model_path: PathBuf,

    /// `model_info.json` served on connect
    pub model_info_path: PathBuf,

    /// SQLite threat log
    pub database_path: PathBuf,

    /// Run the simulated network monitor
    pub monitor_enabled: bool,

    /// Monitor delay window in seconds
    pub monitor_delay: (f64, f64),

    /// Per-subscriber event buffer
    pub event_capacity: usize,

    /// Emit JSON log lines
    pub json_logs: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: constants::get_port(),
            model_path: constants::get_model_path(),
            model_info_path: constants::get_model_info_path(),
            database_path: constants::get_database_path(),
            monitor_enabled: constants::is_monitor_enabled(),
            monitor_delay: constants::get_monitor_delay_window(),

            event_capacity: env::var("EVENT_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(pratiraksha_core::logic::events::DEFAULT_CAPACITY),

            json_logs: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}
