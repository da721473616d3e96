//! Checkpoint Persistence
//!
//! One JSON document per trained model: config, label encoder, feature
//! names, fitted scaler and every layer (weights + BatchNorm running stats).
//! `save` returns the SHA-256 of the written bytes; `load` verifies it.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::features::{LayoutInfo, StandardScaler};
use crate::logic::graph::GraphBuilder;
use super::layers::Layer;
use super::network::{GcnConfig, NetworkFlowGcn};
use super::ModelError;

pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub config: GcnConfig,
    pub class_names: Vec<String>,
    pub feature_names: Vec<String>,
    /// Set when the model was trained on the runtime encoder's columns
    pub layout: Option<LayoutInfo>,
    pub scaler: StandardScaler,
    pub layers: Vec<Layer>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl Checkpoint {
    pub fn new(model: &NetworkFlowGcn, builder: &GraphBuilder) -> Self {
        let feature_names = builder.feature_names().to_vec();
        let layout = LayoutInfo::for_columns(&feature_names);

        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            created_at: Utc::now(),
            config: model.config().clone(),
            class_names: builder.class_names().to_vec(),
            feature_names,
            layout,
            scaler: builder.scaler().clone(),
            layers: model.layers().to_vec(),
        }
    }

    /// Write as JSON, creating parent directories; returns the file's SHA-256
    pub fn save(&self, path: &Path) -> Result<String, ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec(self)?;
        fs::write(path, &bytes)?;

        let checksum = sha256_hex(&bytes);
        log::info!("Model saved to {} (sha256 {})", path.display(), &checksum[..12]);
        Ok(checksum)
    }

    /// Read a checkpoint, verifying its checksum when one is given
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;

        if let Some(expected) = expected_sha256 {
            let actual = sha256_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ModelError::Checksum {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        if checkpoint.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(ModelError::UnsupportedFormat(checkpoint.format_version));
        }
        if checkpoint.class_names.len() != checkpoint.config.num_classes {
            return Err(ModelError::Shape(format!(
                "{} class names for {} output classes",
                checkpoint.class_names.len(),
                checkpoint.config.num_classes
            )));
        }

        Ok(checkpoint)
    }

    /// Split into a ready model and a fitted graph builder
    pub fn into_parts(self) -> Result<(NetworkFlowGcn, GraphBuilder), ModelError> {
        if self.scaler.n_features() != self.config.input_dim {
            return Err(ModelError::Shape(format!(
                "scaler has {} columns, model expects {}",
                self.scaler.n_features(),
                self.config.input_dim
            )));
        }

        let model = NetworkFlowGcn::from_parts(self.config, self.layers)?;
        let builder = GraphBuilder::from_fitted(self.scaler, self.class_names, self.feature_names);
        Ok((model, builder))
    }
}
