//! Threat Calibration Rules
//!
//! Constants only - the logic lives in `classifier.rs`.

// ============================================================================
// CONFIDENCE CALIBRATION
// ============================================================================

/// Non-benign predictions below this confidence get lifted into 0.6..1.0
pub const LOW_CONFIDENCE_FLOOR: f32 = 0.6;

/// Boost applied to already-confident non-benign predictions
pub const CONFIDENCE_BOOST: f32 = 1.15;

/// Ceiling for boosted predictions
pub const BOOSTED_CONFIDENCE_CAP: f32 = 0.98;

/// Reported confidence is always clamped into this window
pub const MIN_REPORTED_CONFIDENCE: f32 = 0.5;
pub const MAX_REPORTED_CONFIDENCE: f32 = 0.99;

// ============================================================================
// BENIGN OVERRIDE (flow-level indicators)
// ============================================================================

/// Seconds
pub const OVERRIDE_DURATION: f32 = 60.0;
/// Bytes
pub const OVERRIDE_SRC_BYTES: f32 = 30_000.0;
pub const OVERRIDE_PACKETS: u32 = 150;

/// Base confidence of an override, before the duration bonus
pub const OVERRIDE_BASE_CONFIDENCE: f32 = 0.85;
pub const OVERRIDE_MAX_CONFIDENCE: f32 = 0.95;

// ============================================================================
// FALLBACK (no model loaded)
// ============================================================================

/// Confidence reported for a benign simulated flow
pub const FALLBACK_BENIGN_CONFIDENCE: f32 = 0.95;

/// Random confidence window for a simulated threat
pub const FALLBACK_THREAT_CONFIDENCE: (f32, f32) = (0.75, 0.98);
