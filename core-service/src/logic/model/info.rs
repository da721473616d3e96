//! Model metadata served to the dashboard (`model_info.json`)

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ModelError;

pub const DEFAULT_ARCHITECTURE: &str = "GCN-Threat-Detector";
pub const DEFAULT_PARAMETER_COUNT: usize = 452_485;
pub const DEFAULT_ACCURACY_PERCENTAGE: f32 = 78.47;
pub const DEFAULT_STATUS: &str = "Running";

/// Training metadata; only the first three fields are guaranteed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_architecture: String,
    pub parameter_count: usize,
    pub accuracy_percentage: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_classes: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_dims: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dims: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropout: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_test_accuracy: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_val_accuracy: Option<f32>,
    /// SHA-256 of the checkpoint this describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_sha256: Option<String>,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            model_architecture: DEFAULT_ARCHITECTURE.to_string(),
            parameter_count: DEFAULT_PARAMETER_COUNT,
            accuracy_percentage: DEFAULT_ACCURACY_PERCENTAGE,
            status: Some(DEFAULT_STATUS.to_string()),
            number_of_classes: None,
            class_labels: Vec::new(),
            training_date: None,
            description: None,
            hidden_dims: None,
            input_dims: None,
            dropout: None,
            final_test_accuracy: None,
            best_val_accuracy: None,
            checkpoint_sha256: None,
        }
    }
}

impl ModelInfo {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load, or fall back to the built-in defaults when missing or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::warn!("Model info file not found at {}", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(info) => info,
            Err(e) => {
                log::error!("Error loading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        log::info!("Model metadata saved to {}", path.display());
        Ok(())
    }
}
