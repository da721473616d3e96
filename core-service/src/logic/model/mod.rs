//! Model Module - NetworkFlowGCN & Runtime Detector
//!
//! Layers, network assembly, checkpoint persistence and the runtime wrapper
//! that scores one flow at a time.

pub mod layers;
pub mod network;
pub mod checkpoint;
pub mod info;
pub mod inference;

#[cfg(test)]
mod tests;

// Re-export common types
pub use checkpoint::{sha256_hex, Checkpoint};
pub use inference::{detect_or_fallback, score_flow, EngineStatus, InferenceError, ThreatDetector};
pub use info::ModelInfo;
pub use network::{GcnConfig, NetworkFlowGcn, Prediction};

use crate::logic::features::LayoutMismatchError;
use crate::logic::graph::GraphError;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum ModelError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(String),
    Shape(String),
    /// `backward` called without a preceding `forward_train`
    MissingForward(&'static str),
    Checksum { expected: String, actual: String },
    UnsupportedFormat(u32),
    Layout(LayoutMismatchError),
    Graph(GraphError),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Io(e) => write!(f, "ModelError: io: {}", e),
            ModelError::Json(e) => write!(f, "ModelError: json: {}", e),
            ModelError::Config(msg) => write!(f, "ModelError: invalid config: {}", msg),
            ModelError::Shape(msg) => write!(f, "ModelError: shape: {}", msg),
            ModelError::MissingForward(layer) => {
                write!(f, "ModelError: backward through {} without a training forward", layer)
            }
            ModelError::Checksum { expected, actual } => write!(
                f,
                "ModelError: checkpoint checksum mismatch (expected {}, got {})",
                expected, actual
            ),
            ModelError::UnsupportedFormat(v) => write!(f, "ModelError: unsupported checkpoint format v{}", v),
            ModelError::Layout(e) => write!(f, "ModelError: {}", e),
            ModelError::Graph(e) => write!(f, "ModelError: {}", e),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        ModelError::Io(e)
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Json(e)
    }
}

impl From<LayoutMismatchError> for ModelError {
    fn from(e: LayoutMismatchError) -> Self {
        ModelError::Layout(e)
    }
}

impl From<GraphError> for ModelError {
    fn from(e: GraphError) -> Self {
        ModelError::Graph(e)
    }
}
