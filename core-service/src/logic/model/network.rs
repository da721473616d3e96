//! NetworkFlowGCN
//!
//! input projection -> 4 x GCN -> graph attention -> MLP classifier.
//! Held as a flat layer list so training walks it forwards and backwards.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::logic::graph::MessageGraph;
use super::layers::{BatchNorm1d, Dropout, GatConv, GcnConv, Layer, Linear, Param, Relu};
use super::ModelError;

pub const DEFAULT_HIDDEN_DIM: usize = 256;
pub const DEFAULT_DROPOUT: f32 = 0.15;
pub const ATTENTION_HEADS: usize = 4;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcnConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub num_classes: usize,
    pub dropout: f32,
    pub heads: usize,
}

impl GcnConfig {
    pub fn new(input_dim: usize, num_classes: usize) -> Self {
        Self {
            input_dim,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            num_classes,
            dropout: DEFAULT_DROPOUT,
            heads: ATTENTION_HEADS,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.input_dim == 0 {
            return Err(ModelError::Config("input_dim must be positive".to_string()));
        }
        // Classifier narrows to hidden / 16
        if self.hidden_dim < 16 || self.hidden_dim % 16 != 0 {
            return Err(ModelError::Config(format!(
                "hidden_dim must be a positive multiple of 16, got {}",
                self.hidden_dim
            )));
        }
        if self.num_classes == 0 {
            return Err(ModelError::Config("num_classes must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::Config(format!("dropout must be in [0, 1), got {}", self.dropout)));
        }
        if self.heads == 0 {
            return Err(ModelError::Config("heads must be positive".to_string()));
        }
        Ok(())
    }
}

/// Predicted class with its softmax distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_index: usize,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
}

// ============================================================================
// NETWORK
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkFlowGcn {
    config: GcnConfig,
    layers: Vec<Layer>,
}

fn block(layers: &mut Vec<Layer>, conv: Layer, width: usize, dropout: f32) {
    layers.push(conv);
    layers.push(Layer::BatchNorm(BatchNorm1d::new(width)));
    layers.push(Layer::Relu(Relu::default()));
    layers.push(Layer::Dropout(Dropout::new(dropout)));
}

impl NetworkFlowGcn {
    pub fn new(config: GcnConfig, seed: u64) -> Result<Self, ModelError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);

        let h = config.hidden_dim;
        let p = config.dropout;
        let mut layers = Vec::with_capacity(34);

        // Input projection
        block(&mut layers, Layer::Linear(Linear::new(config.input_dim, h, &mut rng)), h, p * 0.5);

        // Graph convolutions
        block(&mut layers, Layer::GcnConv(GcnConv::new(h, h, &mut rng)), h, p);
        block(&mut layers, Layer::GcnConv(GcnConv::new(h, h, &mut rng)), h, p);
        block(&mut layers, Layer::GcnConv(GcnConv::new(h, h / 2, &mut rng)), h / 2, p);
        block(&mut layers, Layer::GcnConv(GcnConv::new(h / 2, h / 4, &mut rng)), h / 4, p);

        // Attention
        layers.push(Layer::GatConv(GatConv::new(h / 4, h / 4, config.heads, &mut rng)));
        layers.push(Layer::Relu(Relu::default()));

        // Classifier
        block(&mut layers, Layer::Linear(Linear::new(h / 4, h / 8, &mut rng)), h / 8, p);
        block(&mut layers, Layer::Linear(Linear::new(h / 8, h / 16, &mut rng)), h / 16, p * 0.5);
        layers.push(Layer::Linear(Linear::new(h / 16, config.num_classes, &mut rng)));

        let model = Self { config, layers };

        log::info!("GCN Model initialized:");
        log::info!("   Input dim: {}", model.config.input_dim);
        log::info!("   Hidden dim: {}", model.config.hidden_dim);
        log::info!("   Output classes: {}", model.config.num_classes);
        log::info!("   Dropout: {}", model.config.dropout);
        log::info!("   Parameters: {}", model.parameter_count());

        Ok(model)
    }

    /// Rebuild from checkpointed layers, checking the ends line up with the config
    pub fn from_parts(config: GcnConfig, layers: Vec<Layer>) -> Result<Self, ModelError> {
        config.validate()?;

        let input_dim = match layers.first() {
            Some(Layer::Linear(l)) => l.in_dim(),
            _ => return Err(ModelError::Shape("first layer must be the input projection".to_string())),
        };
        let output_dim = layers.iter().rev().find_map(Layer::out_dim).unwrap_or(0);

        if input_dim != config.input_dim || output_dim != config.num_classes {
            return Err(ModelError::Shape(format!(
                "layers map {} -> {}, config expects {} -> {}",
                input_dim, output_dim, config.input_dim, config.num_classes
            )));
        }

        Ok(Self { config, layers })
    }

    pub fn config(&self) -> &GcnConfig {
        &self.config
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }

    /// Evaluation forward: per-node logits
    pub fn forward(&self, x: &Array2<f32>, graph: &MessageGraph) -> Array2<f32> {
        self.layers
            .iter()
            .fold(x.to_owned(), |h, layer| layer.forward(h, graph))
    }

    /// Training forward: batch statistics, dropout, caches for `backward`
    pub fn forward_train(&mut self, x: &Array2<f32>, graph: &MessageGraph, rng: &mut StdRng) -> Array2<f32> {
        let mut h = x.to_owned();
        for layer in &mut self.layers {
            h = layer.forward_train(h, graph, rng);
        }
        h
    }

    /// Backpropagate logit gradients; parameter grads accumulate
    pub fn backward(&mut self, grad_logits: Array2<f32>, graph: &MessageGraph) -> Result<(), ModelError> {
        let mut grad = grad_logits;
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(grad, graph)?;
        }
        Ok(())
    }

    pub fn zero_grad(&mut self) {
        for param in self.params_mut() {
            param.zero_grad();
        }
    }

    pub fn params(&self) -> Vec<&Param> {
        self.layers.iter().flat_map(Layer::params).collect()
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        self.layers.iter_mut().flat_map(Layer::params_mut).collect()
    }

    /// Trainable scalars (BatchNorm running statistics excluded)
    pub fn parameter_count(&self) -> usize {
        self.params().iter().map(|p| p.len()).sum()
    }

    /// Evaluate a graph and reduce it to one prediction
    ///
    /// Multi-node graphs are averaged over nodes before the softmax.
    pub fn predict_threat(&self, x: &Array2<f32>, graph: &MessageGraph) -> Result<Prediction, ModelError> {
        if x.nrows() == 0 || x.nrows() != graph.num_nodes() {
            return Err(ModelError::Shape(format!(
                "{} feature rows for a graph of {} nodes",
                x.nrows(),
                graph.num_nodes()
            )));
        }
        if x.ncols() != self.config.input_dim {
            return Err(ModelError::Shape(format!(
                "expected {} input features, got {}",
                self.config.input_dim,
                x.ncols()
            )));
        }

        let logits = self.forward(x, graph);
        let mean = logits.sum_axis(Axis(0)) / logits.nrows() as f32;
        let probabilities = softmax(&mean);

        let (class_index, confidence) = argmax(&probabilities);

        Ok(Prediction {
            class_index,
            confidence,
            probabilities: probabilities.to_vec(),
        })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let exp = logits.mapv(|v| (v - max).exp());
    let total = exp.sum();
    exp / total
}

/// Row-wise softmax
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row /= total;
    }
    out
}

/// Index and value of the largest entry; first wins on ties
pub fn argmax(values: &Array1<f32>) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}
