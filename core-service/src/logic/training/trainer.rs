//! Trainer
//!
//! Full-graph training: every epoch is one forward/backward over all nodes,
//! with the loss restricted to the training split. Validation accuracy
//! drives both LR scheduling and early stopping; the best weights seen are
//! kept in memory and restored when training ends.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::logic::graph::{DataSplit, FlowGraph, MessageGraph};
use crate::logic::model::{ModelError, NetworkFlowGcn};
use super::loss::{cross_entropy, masked_metrics, Metrics};
use super::optimizer::{clip_grad_norm, AdamW, DEFAULT_LEARNING_RATE, DEFAULT_MAX_GRAD_NORM, DEFAULT_WEIGHT_DECAY};
use super::scheduler::ReduceLrOnPlateau;

pub const DEFAULT_EPOCHS: usize = 200;
pub const DEFAULT_PATIENCE: usize = 25;
const LOG_EVERY: usize = 10;

// ============================================================================
// DATA
// ============================================================================

/// Node features, normalised graph, labels and the split
pub struct GraphData {
    pub x: Array2<f32>,
    pub graph: MessageGraph,
    pub labels: Vec<usize>,
    pub split: DataSplit,
}

impl GraphData {
    pub fn new(flow_graph: &FlowGraph, split: DataSplit) -> Self {
        Self {
            x: flow_graph.x.clone(),
            graph: flow_graph.message_graph(),
            labels: flow_graph.labels.clone(),
            split,
        }
    }
}

// ============================================================================
// CONFIG & HISTORY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub lr: f32,
    pub weight_decay: f32,
    pub max_grad_norm: f32,
    pub epochs: usize,
    pub patience: usize,
    /// Dropout mask seed
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            lr: DEFAULT_LEARNING_RATE,
            weight_decay: DEFAULT_WEIGHT_DECAY,
            max_grad_norm: DEFAULT_MAX_GRAD_NORM,
            epochs: DEFAULT_EPOCHS,
            patience: DEFAULT_PATIENCE,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_loss: Vec<f32>,
    pub train_acc: Vec<f32>,
    pub val_loss: Vec<f32>,
    pub val_acc: Vec<f32>,
    pub lr: Vec<f32>,
}

impl TrainingHistory {
    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }

    pub fn best_val_acc(&self) -> f32 {
        self.val_acc.iter().copied().fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub epochs_run: usize,
    pub best_val_acc: f32,
    pub stopped_early: bool,
}

// ============================================================================
// TRAINER
// ============================================================================

pub struct Trainer {
    model: NetworkFlowGcn,
    config: TrainerConfig,
    optimizer: AdamW,
    scheduler: ReduceLrOnPlateau,
    rng: StdRng,
    history: TrainingHistory,
}

impl Trainer {
    pub fn new(model: NetworkFlowGcn, config: TrainerConfig) -> Self {
        Self {
            optimizer: AdamW::new(config.lr, config.weight_decay),
            scheduler: ReduceLrOnPlateau::default(),
            rng: StdRng::seed_from_u64(config.seed),
            history: TrainingHistory::default(),
            model,
            config,
        }
    }

    pub fn model(&self) -> &NetworkFlowGcn {
        &self.model
    }

    pub fn into_model(self) -> NetworkFlowGcn {
        self.model
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn learning_rate(&self) -> f32 {
        self.optimizer.lr
    }

    /// One optimisation step on the training split
    pub fn train_epoch(&mut self, data: &GraphData) -> Result<Metrics, ModelError> {
        self.model.zero_grad();

        let logits = self.model.forward_train(&data.x, &data.graph, &mut self.rng);
        let (metrics, grad) = cross_entropy(&logits, &data.labels, &data.split.train);
        self.model.backward(grad, &data.graph)?;

        let mut params = self.model.params_mut();
        clip_grad_norm(&mut params, self.config.max_grad_norm);
        self.optimizer.step(&mut params);

        Ok(metrics)
    }

    /// Evaluation-mode metrics on `rows`
    pub fn evaluate(&self, data: &GraphData, rows: &[usize]) -> Metrics {
        let logits = self.model.forward(&data.x, &data.graph);
        masked_metrics(&logits, &data.labels, rows)
    }

    pub fn validate(&self, data: &GraphData) -> Metrics {
        self.evaluate(data, &data.split.val)
    }

    pub fn train(&mut self, data: &GraphData) -> Result<TrainOutcome, ModelError> {
        let (epochs, patience) = (self.config.epochs, self.config.patience);
        log::info!("Starting training for {} epochs...", epochs);
        log::info!(
            "Train samples: {}, Val samples: {}, Test samples: {}",
            data.split.train.len(),
            data.split.val.len(),
            data.split.test.len()
        );

        let mut best_val_acc = 0.0f32;
        let mut best_model: Option<NetworkFlowGcn> = None;
        let mut bad_epochs = 0;
        let mut stopped_early = false;

        for epoch in 0..epochs {
            let train = self.train_epoch(data)?;
            let val = self.validate(data);

            self.history.train_loss.push(train.loss);
            self.history.train_acc.push(train.accuracy);
            self.history.val_loss.push(val.loss);
            self.history.val_acc.push(val.accuracy);
            self.history.lr.push(self.optimizer.lr);

            self.optimizer.lr = self.scheduler.step(val.accuracy, self.optimizer.lr);

            if val.accuracy > best_val_acc {
                best_val_acc = val.accuracy;
                bad_epochs = 0;
                best_model = Some(self.model.clone());
            } else {
                bad_epochs += 1;
            }

            if epoch % LOG_EVERY == 0 || epoch + 1 == epochs {
                log::info!(
                    "Epoch {:3} | Train Loss: {:.4} | Train Acc: {:.4} | Val Loss: {:.4} | Val Acc: {:.4} | Best: {:.4}",
                    epoch,
                    train.loss,
                    train.accuracy,
                    val.loss,
                    val.accuracy,
                    best_val_acc
                );
            }

            if bad_epochs >= patience {
                log::info!("Early stopping at epoch {}", epoch);
                stopped_early = true;
                break;
            }
        }

        if let Some(best) = best_model {
            self.model = best;
        }
        log::info!("Training completed! Best validation accuracy: {:.4}", best_val_acc);

        Ok(TrainOutcome {
            epochs_run: self.history.epochs(),
            best_val_acc,
            stopped_early,
        })
    }

    pub fn test(&self, data: &GraphData) -> f32 {
        let accuracy = self.evaluate(data, &data.split.test).accuracy;
        log::info!("Test Accuracy: {:.4}", accuracy);
        accuracy
    }
}
