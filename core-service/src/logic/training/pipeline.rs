//! Training Pipeline
//!
//! dataset -> stratified sample -> graph -> split -> model -> train -> test
//! -> checkpoint + `model_info.json`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DATASET_PATH, FALLBACK_DATASET_PATH};
use crate::logic::dataset::{load_with_fallback, DatasetError, FlowTable, LABEL_COLUMN};
use crate::logic::graph::{DataSplit, EdgeStrategy, GraphBuilder, GraphError, DEFAULT_TRAIN_RATIO, DEFAULT_VAL_RATIO};
use crate::logic::model::info::DEFAULT_STATUS;
use crate::logic::model::network::{DEFAULT_DROPOUT, DEFAULT_HIDDEN_DIM};
use crate::logic::model::{Checkpoint, GcnConfig, ModelError, ModelInfo, NetworkFlowGcn};
use super::trainer::{GraphData, Trainer, TrainerConfig, TrainingHistory};

pub const CHECKPOINT_FILE: &str = "gcn_threat_detector.json";
pub const MODEL_INFO_FILE: &str = "model_info.json";
pub const DEFAULT_NROWS: usize = 15_000;
pub const DEFAULT_MAX_SAMPLES: usize = 10_000;

const ARCHITECTURE: &str = "Graph Convolutional Network with Attention";
const DESCRIPTION: &str = "GCN-based ransomware threat detector trained on balanced dataset";

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum TrainingError {
    Dataset(DatasetError),
    Graph(GraphError),
    Model(ModelError),
}

impl std::fmt::Display for TrainingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingError::Dataset(e) => write!(f, "TrainingError: {}", e),
            TrainingError::Graph(e) => write!(f, "TrainingError: {}", e),
            TrainingError::Model(e) => write!(f, "TrainingError: {}", e),
        }
    }
}

impl std::error::Error for TrainingError {}

impl From<DatasetError> for TrainingError {
    fn from(e: DatasetError) -> Self {
        TrainingError::Dataset(e)
    }
}

impl From<GraphError> for TrainingError {
    fn from(e: GraphError) -> Self {
        TrainingError::Graph(e)
    }
}

impl From<ModelError> for TrainingError {
    fn from(e: ModelError) -> Self {
        TrainingError::Model(e)
    }
}

// ============================================================================
// CONFIG & REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub dataset: PathBuf,
    pub fallback_dataset: Option<PathBuf>,
    pub label_column: String,
    pub nrows: Option<usize>,
    pub max_samples: usize,
    pub edges: EdgeStrategy,
    pub hidden_dim: usize,
    pub dropout: f32,
    pub train_ratio: f32,
    pub val_ratio: f32,
    /// Sampling, split and weight init
    pub seed: u64,
    pub trainer: TrainerConfig,
    pub output_dir: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from(DEFAULT_DATASET_PATH),
            fallback_dataset: Some(PathBuf::from(FALLBACK_DATASET_PATH)),
            label_column: LABEL_COLUMN.to_string(),
            nrows: Some(DEFAULT_NROWS),
            max_samples: DEFAULT_MAX_SAMPLES,
            edges: EdgeStrategy::default(),
            hidden_dim: DEFAULT_HIDDEN_DIM,
            dropout: DEFAULT_DROPOUT,
            train_ratio: DEFAULT_TRAIN_RATIO,
            val_ratio: DEFAULT_VAL_RATIO,
            seed: 42,
            trainer: TrainerConfig::default(),
            output_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub test_accuracy: f32,
    pub best_val_accuracy: f32,
    pub epochs_run: usize,
    pub stopped_early: bool,
    pub parameter_count: usize,
    pub class_names: Vec<String>,
    pub checkpoint_path: PathBuf,
    pub model_info_path: PathBuf,
    pub checkpoint_sha256: String,
    pub history: TrainingHistory,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub fn train_from_csv(config: &TrainingConfig) -> Result<TrainingReport, TrainingError> {
    let table = load_with_fallback(
        &config.dataset,
        config.fallback_dataset.as_deref(),
        &config.label_column,
        config.nrows,
    )?;
    train_on_table(&table, config)
}

pub fn train_on_table(table: &FlowTable, config: &TrainingConfig) -> Result<TrainingReport, TrainingError> {
    let table = table.stratified_sample(config.max_samples, config.seed);

    let mut builder = GraphBuilder::new(config.edges);
    let graph = builder.create_graph_from_flows(&table)?;

    let split = DataSplit::random(graph.num_nodes(), config.train_ratio, config.val_ratio, config.seed);
    let data = GraphData::new(&graph, split);

    let model_config = GcnConfig {
        hidden_dim: config.hidden_dim,
        dropout: config.dropout,
        ..GcnConfig::new(graph.num_features(), graph.num_classes())
    };
    let model = NetworkFlowGcn::new(model_config, config.seed)?;

    let mut trainer = Trainer::new(model, config.trainer.clone());
    let outcome = trainer.train(&data)?;
    let test_accuracy = trainer.test(&data);

    let checkpoint_path = config.output_dir.join(CHECKPOINT_FILE);
    let checksum = Checkpoint::new(trainer.model(), &builder).save(&checkpoint_path)?;

    let model = trainer.model();
    let info = ModelInfo {
        model_architecture: ARCHITECTURE.to_string(),
        parameter_count: model.parameter_count(),
        accuracy_percentage: test_accuracy * 100.0,
        status: Some(DEFAULT_STATUS.to_string()),
        number_of_classes: Some(graph.num_classes()),
        class_labels: graph.class_names.clone(),
        training_date: Some(chrono::Local::now().to_rfc3339()),
        description: Some(DESCRIPTION.to_string()),
        hidden_dims: Some(model.config().hidden_dim),
        input_dims: Some(model.config().input_dim),
        dropout: Some(model.config().dropout),
        final_test_accuracy: Some(test_accuracy),
        best_val_accuracy: Some(outcome.best_val_acc),
        checkpoint_sha256: Some(checksum.clone()),
    };
    let model_info_path = config.output_dir.join(MODEL_INFO_FILE);
    info.save(&model_info_path)?;

    log::info!("{}", "=".repeat(60));
    log::info!("TRAINING SUMMARY");
    log::info!("{}", "=".repeat(60));
    log::info!("Test Accuracy: {:.4} ({:.2}%)", test_accuracy, test_accuracy * 100.0);
    log::info!("Best Validation Accuracy: {:.4}", outcome.best_val_acc);
    log::info!("Classes: {:?}", graph.class_names);
    log::info!("Model Parameters: {}", info.parameter_count);

    Ok(TrainingReport {
        test_accuracy,
        best_val_accuracy: outcome.best_val_acc,
        epochs_run: outcome.epochs_run,
        stopped_early: outcome.stopped_early,
        parameter_count: info.parameter_count,
        class_names: graph.class_names.clone(),
        checkpoint_path,
        model_info_path,
        checkpoint_sha256: checksum,
        history: trainer.history().clone(),
    })
}
