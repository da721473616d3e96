//! Threat Module
//!
//! Turns raw model output into a dashboard-facing detection.
//!
//! ## Structure
//! - `types`: Core types (ThreatClass, ThreatStatus, ThreatDetection)
//! - `rules`: Calibration constants and the benign-override thresholds
//! - `classifier`: Confidence calibration and the no-model heuristic

pub mod types;
pub mod rules;
pub mod classifier;

pub use types::{FrontendThreat, ThreatClass, ThreatDetection, ThreatStatus, UnknownThreatClass, UnknownThreatStatus};
pub use classifier::{calibrate, fallback_for_label, heuristic_class, Calibrated};
