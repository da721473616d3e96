//! Inference Engine - Runtime GCN Detector
//!
//! Loads a trained checkpoint and scores one flow at a time:
//! encode -> single-node graph -> softmax -> argmax -> calibration.
//! `detect_or_fallback` keeps the monitor running when no model is loaded.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::ArrayView1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logic::features::{encode_flow, FlowRecord};
use crate::logic::graph::GraphBuilder;
use crate::logic::threat::{calibrate, fallback_for_label, heuristic_class, ThreatClass, ThreatDetection};
use super::checkpoint::Checkpoint;
use super::info::ModelInfo;
use super::network::{NetworkFlowGcn, Prediction};
use super::ModelError;

pub const METHOD_GCN: &str = "gcn";
pub const METHOD_FALLBACK: &str = "fallback";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Engine Status for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub model_loaded: bool,
    pub model_name: String,
    pub inference_device: String,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl EngineStatus {
    /// Status when the monitor runs on the fallback path
    pub fn unloaded() -> Self {
        Self {
            model_loaded: false,
            model_name: "None".to_string(),
            inference_device: "CPU".to_string(),
            avg_latency_ms: 0.0,
            inference_count: 0,
            loaded_at: None,
        }
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub struct InferenceError(pub String);

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InferenceError: {}", self.0)
    }
}

impl std::error::Error for InferenceError {}

impl From<ModelError> for InferenceError {
    fn from(e: ModelError) -> Self {
        InferenceError(e.to_string())
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct ThreatDetector {
    model: NetworkFlowGcn,
    builder: GraphBuilder,
    /// Output index -> threat class
    classes: Vec<ThreatClass>,
    model_name: String,
    loaded_at: DateTime<Utc>,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl ThreatDetector {
    /// Load a checkpoint, verifying it against `model_info` when that
    /// records a checksum
    pub fn load(checkpoint_path: &Path, model_info: Option<&ModelInfo>) -> Result<Self, ModelError> {
        log::info!("Loading GCN model from: {}", checkpoint_path.display());

        let expected = model_info.and_then(|info| info.checkpoint_sha256.as_deref());
        if expected.is_none() {
            log::warn!("No checkpoint checksum recorded, skipping verification");
        }

        let checkpoint = Checkpoint::load(checkpoint_path, expected)?;
        match &checkpoint.layout {
            Some(layout) => layout.verify()?,
            None => log::warn!(
                "Model trained on {} dataset columns; runtime flows are encoded into the first {}",
                checkpoint.feature_names.len(),
                checkpoint.config.input_dim
            ),
        }

        let (model, builder) = checkpoint.into_parts()?;
        let detector = Self::new(model, builder, checkpoint_path.display().to_string())?;

        log::info!(
            "GCN model loaded: {} classes, {} parameters",
            detector.classes.len(),
            detector.model.parameter_count()
        );
        Ok(detector)
    }

    /// Wrap an in-memory model; class names must all be known threat classes
    pub fn new(model: NetworkFlowGcn, builder: GraphBuilder, model_name: String) -> Result<Self, ModelError> {
        if !builder.is_fitted() {
            return Err(ModelError::Config("graph builder is not fitted".to_string()));
        }

        let classes = builder
            .class_names()
            .iter()
            .map(|name| name.parse::<ThreatClass>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ModelError::Config(e.to_string()))?;

        if classes.len() != model.config().num_classes {
            return Err(ModelError::Shape(format!(
                "{} class names for {} model outputs",
                classes.len(),
                model.config().num_classes
            )));
        }

        Ok(Self {
            model,
            builder,
            classes,
            model_name,
            loaded_at: Utc::now(),
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        })
    }

    pub fn classes(&self) -> &[ThreatClass] {
        &self.classes
    }

    pub fn model(&self) -> &NetworkFlowGcn {
        &self.model
    }

    /// Raw model output for one flow, before calibration
    pub fn predict(&self, flow: &FlowRecord) -> Result<(ThreatClass, Prediction), InferenceError> {
        let row = encode_flow(flow, self.model.config().input_dim);
        let graph = self
            .builder
            .create_single_flow_graph(ArrayView1::from(&row))
            .map_err(|e| InferenceError(e.to_string()))?;

        let prediction = self.model.predict_threat(&graph.x, &graph.message_graph())?;
        let class = self
            .classes
            .get(prediction.class_index)
            .copied()
            .ok_or_else(|| InferenceError(format!("class index {} out of range", prediction.class_index)))?;

        Ok((class, prediction))
    }

    /// Score one flow and calibrate the result
    pub fn detect(&self, flow: &FlowRecord) -> Result<ThreatDetection, InferenceError> {
        let start = Instant::now();

        let (class, prediction) = self.predict(flow)?;
        let calibrated = calibrate(class, prediction.confidence, flow);

        self.latency_sum_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        log::debug!(
            "GCN: {} raw {:.3} -> {} {:.3}",
            class,
            prediction.confidence,
            calibrated.class,
            calibrated.confidence
        );
        Ok(calibrated.into_detection(flow, METHOD_GCN))
    }

    pub fn status(&self) -> EngineStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        EngineStatus {
            model_loaded: true,
            model_name: self.model_name.clone(),
            inference_device: "CPU".to_string(),
            avg_latency_ms: avg,
            inference_count: count,
            loaded_at: Some(self.loaded_at),
        }
    }
}

// ============================================================================
// FALLBACK
// ============================================================================

/// Model if loaded, fallback otherwise
///
/// The fallback trusts `label` when the flow is simulated; without one it
/// applies the benign-override heuristic.
pub fn detect_or_fallback<R: Rng + ?Sized>(
    detector: Option<&ThreatDetector>,
    flow: &FlowRecord,
    label: Option<ThreatClass>,
    rng: &mut R,
) -> ThreatDetection {
    if let Some(detector) = detector {
        match detector.detect(flow) {
            Ok(detection) => return detection,
            Err(e) => log::warn!("GCN inference failed ({}), using fallback", e),
        }
    }

    let calibrated = match label {
        Some(label) => fallback_for_label(label, rng),
        None => heuristic_class(flow),
    };
    calibrated.into_detection(flow, METHOD_FALLBACK)
}

/// Score a flow with no known label (API submissions)
pub fn score_flow(detector: Option<&ThreatDetector>, flow: &FlowRecord) -> ThreatDetection {
    detect_or_fallback(detector, flow, None, &mut rand::thread_rng())
}
