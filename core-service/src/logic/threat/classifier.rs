//! Threat Classifier
//!
//! Only calibration logic - no types, no model.
//! Input: predicted class + softmax confidence + the flow itself
//! Output: `Calibrated` class and reported confidence

use rand::Rng;

use crate::logic::features::FlowRecord;
use super::rules::*;
use super::types::{ThreatClass, ThreatDetection};

/// Final class and confidence after calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibrated {
    pub class: ThreatClass,
    pub confidence: f32,
}

impl Calibrated {
    pub fn into_detection(self, flow: &FlowRecord, method: &str) -> ThreatDetection {
        ThreatDetection {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            source_ip: flow.src_ip.clone(),
            dest_ip: flow.dst_ip.clone(),
            threat_type: self.class,
            confidence: self.confidence,
            status: self.class.status(),
            method: method.to_string(),
        }
    }
}

/// Flow carries strong exfiltration indicators
pub fn has_threat_indicators(flow: &FlowRecord) -> bool {
    flow.duration > OVERRIDE_DURATION
        || flow.src_bytes > OVERRIDE_SRC_BYTES
        || flow.packets > OVERRIDE_PACKETS
}

fn override_confidence(flow: &FlowRecord) -> f32 {
    (OVERRIDE_BASE_CONFIDENCE + flow.duration / 100.0 * 0.1).min(OVERRIDE_MAX_CONFIDENCE)
}

/// Calibrate a model prediction
///
/// 1. Non-benign: low confidence is lifted into 0.6..1.0, high confidence is
///    boosted and capped at 0.98.
/// 2. Benign with threat indicators is re-labelled Ransomware.
/// 3. Clamp into 0.5..0.99.
pub fn calibrate(predicted: ThreatClass, raw_confidence: f32, flow: &FlowRecord) -> Calibrated {
    let mut class = predicted;
    let mut confidence = raw_confidence;

    if !class.is_benign() {
        confidence = if confidence < LOW_CONFIDENCE_FLOOR {
            LOW_CONFIDENCE_FLOOR + confidence * (1.0 - LOW_CONFIDENCE_FLOOR)
        } else {
            (confidence * CONFIDENCE_BOOST).min(BOOSTED_CONFIDENCE_CAP)
        };
    }

    if class.is_benign() && has_threat_indicators(flow) {
        class = ThreatClass::Ransomware;
        confidence = override_confidence(flow);
    }

    Calibrated {
        class,
        confidence: confidence.clamp(MIN_REPORTED_CONFIDENCE, MAX_REPORTED_CONFIDENCE),
    }
}

/// No model and no label: indicator rule only
pub fn heuristic_class(flow: &FlowRecord) -> Calibrated {
    if has_threat_indicators(flow) {
        Calibrated {
            class: ThreatClass::Ransomware,
            confidence: override_confidence(flow),
        }
    } else {
        Calibrated {
            class: ThreatClass::Benign,
            confidence: FALLBACK_BENIGN_CONFIDENCE,
        }
    }
}

/// No model but a known (simulated) label: randomised confidence
pub fn fallback_for_label<R: Rng + ?Sized>(label: ThreatClass, rng: &mut R) -> Calibrated {
    let confidence = if label.is_benign() {
        FALLBACK_BENIGN_CONFIDENCE
    } else {
        let (lo, hi) = FALLBACK_THREAT_CONFIDENCE;
        rng.gen_range(lo..hi)
    };

    Calibrated { class: label, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_flow() -> FlowRecord {
        FlowRecord {
            src_ip: "192.168.1.2".to_string(),
            dst_ip: "10.0.1.1".to_string(),
            duration: 12.0,
            protocol: 6,
            src_bytes: 2000.0,
            dst_bytes: 3000.0,
            packets: 20,
            tcp_flags: 16,
            active_time: 10.0,
            idle_time: 2.0,
        }
    }

    #[test]
    fn test_low_confidence_threat_is_lifted() {
        let c = calibrate(ThreatClass::Locky, 0.3, &quiet_flow());
        assert_eq!(c.class, ThreatClass::Locky);
        assert!((c.confidence - 0.72).abs() < 1e-6);
    }

    #[test]
    fn test_confident_threat_is_boosted_and_capped() {
        let c = calibrate(ThreatClass::WannaCry, 0.7, &quiet_flow());
        assert!((c.confidence - 0.805).abs() < 1e-5);

        let capped = calibrate(ThreatClass::WannaCry, 0.95, &quiet_flow());
        assert!((capped.confidence - 0.98).abs() < 1e-6);
    }

    #[test]
    fn test_benign_override_on_indicators() {
        let mut flow = quiet_flow();
        flow.duration = 80.0;

        let c = calibrate(ThreatClass::Benign, 0.9, &flow);
        assert_eq!(c.class, ThreatClass::Ransomware);
        assert!((c.confidence - 0.93).abs() < 1e-5);

        flow.duration = 100.0;
        flow.packets = 190;
        let capped = calibrate(ThreatClass::Benign, 0.9, &flow);
        assert!((capped.confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_benign_confidence_is_clamped() {
        let c = calibrate(ThreatClass::Benign, 0.21, &quiet_flow());
        assert_eq!(c.class, ThreatClass::Benign);
        assert_eq!(c.confidence, 0.5);

        let hi = calibrate(ThreatClass::Benign, 1.0, &quiet_flow());
        assert_eq!(hi.confidence, 0.99);
    }

    #[test]
    fn test_heuristic_and_label_fallback() {
        assert_eq!(heuristic_class(&quiet_flow()).class, ThreatClass::Benign);

        let mut noisy = quiet_flow();
        noisy.src_bytes = 40_000.0;
        assert_eq!(heuristic_class(&noisy).class, ThreatClass::Ransomware);

        let mut rng = StdRng::seed_from_u64(7);
        let benign = fallback_for_label(ThreatClass::Benign, &mut rng);
        assert_eq!(benign.confidence, 0.95);
        for _ in 0..50 {
            let c = fallback_for_label(ThreatClass::Cryptolocker, &mut rng);
            assert!(c.confidence >= 0.75 && c.confidence < 0.98);
        }
    }
}
