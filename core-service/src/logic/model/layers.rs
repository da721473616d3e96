//! Layers with hand-written forward/backward passes
//!
//! Every layer has two forward paths:
//! - `forward`: evaluation, immutable, running statistics, no dropout
//! - `forward_train`: batch statistics and dropout, caches what `backward` needs
//!
//! `backward` consumes the cache, accumulates parameter gradients and returns
//! the gradient w.r.t. the layer input. Weights are stored `in x out`,
//! biases and BatchNorm affine terms as `1 x out` rows.

use ndarray::{s, Array1, Array2, Axis};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logic::graph::MessageGraph;
use super::ModelError;

pub const BN_MOMENTUM: f32 = 0.1;
pub const BN_EPS: f32 = 1e-5;
pub const LEAKY_RELU_SLOPE: f32 = 0.2;

// ============================================================================
// PARAMETER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub value: Array2<f32>,
    #[serde(skip)]
    pub grad: Array2<f32>,
}

impl Param {
    pub fn new(value: Array2<f32>) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Self { value, grad }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(Array2::zeros((rows, cols)))
    }

    pub fn uniform(rows: usize, cols: usize, bound: f32, rng: &mut StdRng) -> Self {
        let dist = Uniform::new_inclusive(-bound, bound);
        Self::new(Array2::from_shape_fn((rows, cols), |_| rng.sample(dist)))
    }

    /// Glorot/Xavier uniform
    pub fn glorot(rows: usize, cols: usize, rng: &mut StdRng) -> Self {
        let bound = (6.0 / (rows + cols) as f32).sqrt();
        Self::uniform(rows, cols, bound, rng)
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn zero_grad(&mut self) {
        self.grad = Array2::zeros(self.value.raw_dim());
    }

    fn accumulate(&mut self, grad: Array2<f32>) {
        // Deserialized params start with an empty grad
        if self.grad.dim() == self.value.dim() {
            self.grad += &grad;
        } else {
            self.grad = grad;
        }
    }
}

fn column_sums(grad: &Array2<f32>) -> Array2<f32> {
    grad.sum_axis(Axis(0)).insert_axis(Axis(0))
}

// ============================================================================
// LINEAR
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Param,
    pub bias: Param,
    #[serde(skip)]
    input: Option<Array2<f32>>,
}

impl Linear {
    /// uniform(+-1/sqrt(fan_in)) weights, zero bias
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (in_dim.max(1) as f32).sqrt();
        Self {
            weight: Param::uniform(in_dim, out_dim, bound, rng),
            bias: Param::zeros(1, out_dim),
            input: None,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weight.value) + &self.bias.value
    }

    fn forward_train(&mut self, x: Array2<f32>) -> Array2<f32> {
        let out = self.forward(&x);
        self.input = Some(x);
        out
    }

    fn backward(&mut self, grad: Array2<f32>) -> Result<Array2<f32>, ModelError> {
        let x = self.input.take().ok_or(ModelError::MissingForward("linear"))?;
        self.weight.accumulate(x.t().dot(&grad));
        self.bias.accumulate(column_sums(&grad));
        Ok(grad.dot(&self.weight.value.t()))
    }
}

// ============================================================================
// BATCH NORM
// ============================================================================

#[derive(Debug, Clone)]
struct BatchNormCache {
    x_hat: Array2<f32>,
    inv_std: Array1<f32>,
    /// false when the batch was too small and running stats were used
    batch_stats: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNorm1d {
    pub gamma: Param,
    pub beta: Param,
    pub running_mean: Array1<f32>,
    pub running_var: Array1<f32>,
    #[serde(skip)]
    cache: Option<BatchNormCache>,
}

impl BatchNorm1d {
    pub fn new(features: usize) -> Self {
        Self {
            gamma: Param::new(Array2::ones((1, features))),
            beta: Param::zeros(1, features),
            running_mean: Array1::zeros(features),
            running_var: Array1::ones(features),
            cache: None,
        }
    }

    pub fn features(&self) -> usize {
        self.running_mean.len()
    }

    fn running_inv_std(&self) -> Array1<f32> {
        self.running_var.mapv(|v| 1.0 / (v + BN_EPS).sqrt())
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let x_hat = (x - &self.running_mean) * &self.running_inv_std();
        x_hat * &self.gamma.value + &self.beta.value
    }

    fn forward_train(&mut self, x: Array2<f32>) -> Array2<f32> {
        let n = x.nrows();

        let (x_hat, inv_std, batch_stats) = if n < 2 {
            // No variance in a single row
            let inv_std = self.running_inv_std();
            ((&x - &self.running_mean) * &inv_std, inv_std, false)
        } else {
            let mean = x.sum_axis(Axis(0)) / n as f32;
            let centered = &x - &mean;
            let var = (&centered * &centered).sum_axis(Axis(0)) / n as f32;
            let inv_std = var.mapv(|v| 1.0 / (v + BN_EPS).sqrt());

            let unbiased = &var * (n as f32 / (n - 1) as f32);
            self.running_mean = &self.running_mean * (1.0 - BN_MOMENTUM) + &mean * BN_MOMENTUM;
            self.running_var = &self.running_var * (1.0 - BN_MOMENTUM) + &unbiased * BN_MOMENTUM;

            (centered * &inv_std, inv_std, true)
        };

        let out = &x_hat * &self.gamma.value + &self.beta.value;
        self.cache = Some(BatchNormCache { x_hat, inv_std, batch_stats });
        out
    }

    fn backward(&mut self, grad: Array2<f32>) -> Result<Array2<f32>, ModelError> {
        let BatchNormCache { x_hat, inv_std, batch_stats } =
            self.cache.take().ok_or(ModelError::MissingForward("batch_norm"))?;

        self.gamma.accumulate(column_sums(&(&grad * &x_hat)));
        self.beta.accumulate(column_sums(&grad));

        let dx_hat = &grad * &self.gamma.value;
        let dx = if batch_stats {
            let n = grad.nrows() as f32;
            let mean_dx_hat = dx_hat.sum_axis(Axis(0)) / n;
            let mean_dx_hat_x_hat = (&dx_hat * &x_hat).sum_axis(Axis(0)) / n;
            (dx_hat - &mean_dx_hat - &x_hat * &mean_dx_hat_x_hat) * &inv_std
        } else {
            dx_hat * &inv_std
        };

        Ok(dx)
    }
}

// ============================================================================
// ACTIVATION & DROPOUT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relu {
    #[serde(skip)]
    mask: Option<Array2<f32>>,
}

impl Relu {
    fn forward_train(&mut self, x: Array2<f32>) -> Array2<f32> {
        self.mask = Some(x.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }));
        x.mapv_into(|v| v.max(0.0))
    }

    fn backward(&mut self, grad: Array2<f32>) -> Result<Array2<f32>, ModelError> {
        let mask = self.mask.take().ok_or(ModelError::MissingForward("relu"))?;
        Ok(grad * &mask)
    }
}

/// Inverted dropout; identity in evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropout {
    pub p: f32,
    #[serde(skip)]
    mask: Option<Array2<f32>>,
}

impl Dropout {
    pub fn new(p: f32) -> Self {
        Self { p, mask: None }
    }

    fn forward_train(&mut self, x: Array2<f32>, rng: &mut StdRng) -> Array2<f32> {
        if self.p <= 0.0 {
            self.mask = None;
            return x;
        }

        let keep = 1.0 - self.p;
        let mask = Array2::from_shape_fn(x.raw_dim(), |_| {
            if rng.gen::<f32>() < keep { 1.0 / keep } else { 0.0 }
        });
        let out = x * &mask;
        self.mask = Some(mask);
        out
    }

    fn backward(&mut self, grad: Array2<f32>) -> Array2<f32> {
        match self.mask.take() {
            Some(mask) => grad * &mask,
            None => grad,
        }
    }
}

// ============================================================================
// GCN CONVOLUTION
// ============================================================================

/// `out = A_hat (x W) + b` with the symmetric-normalised adjacency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcnConv {
    pub weight: Param,
    pub bias: Param,
    #[serde(skip)]
    input: Option<Array2<f32>>,
}

impl GcnConv {
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        Self {
            weight: Param::glorot(in_dim, out_dim, rng),
            bias: Param::zeros(1, out_dim),
            input: None,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn forward(&self, x: &Array2<f32>, graph: &MessageGraph) -> Array2<f32> {
        graph.propagate(&x.dot(&self.weight.value)) + &self.bias.value
    }

    fn forward_train(&mut self, x: Array2<f32>, graph: &MessageGraph) -> Array2<f32> {
        let out = self.forward(&x, graph);
        self.input = Some(x);
        out
    }

    fn backward(&mut self, grad: Array2<f32>, graph: &MessageGraph) -> Result<Array2<f32>, ModelError> {
        let x = self.input.take().ok_or(ModelError::MissingForward("gcn_conv"))?;

        let grad_h = graph.propagate_transposed(&grad);
        self.weight.accumulate(x.t().dot(&grad_h));
        self.bias.accumulate(column_sums(&grad));
        Ok(grad_h.dot(&self.weight.value.t()))
    }
}

// ============================================================================
// GRAPH ATTENTION
// ============================================================================

#[derive(Debug, Clone)]
struct AttentionCache {
    x: Array2<f32>,
    /// nodes x (heads * out)
    h: Array2<f32>,
    /// edges x heads, before LeakyReLU
    scores: Array2<f32>,
    /// edges x heads, softmax over each target's incoming edges
    alpha: Array2<f32>,
}

/// Multi-head graph attention, head outputs averaged
///
/// For edge `j -> i` and head `k`:
/// `score = LeakyReLU(a_src_k . h_k[j] + a_dst_k . h_k[i])`,
/// `alpha` is the softmax of the scores over edges into `i`, and
/// `out[i] = mean_k sum_j alpha * h_k[j] + b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatConv {
    pub heads: usize,
    pub weight: Param,
    pub att_src: Param,
    pub att_dst: Param,
    pub bias: Param,
    #[serde(skip)]
    cache: Option<AttentionCache>,
}

fn leaky_relu(v: f32) -> f32 {
    if v > 0.0 { v } else { LEAKY_RELU_SLOPE * v }
}

impl GatConv {
    pub fn new(in_dim: usize, out_dim: usize, heads: usize, rng: &mut StdRng) -> Self {
        Self {
            heads,
            weight: Param::glorot(in_dim, heads * out_dim, rng),
            att_src: Param::glorot(heads, out_dim, rng),
            att_dst: Param::glorot(heads, out_dim, rng),
            bias: Param::zeros(1, out_dim),
            cache: None,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.bias.value.ncols()
    }

    fn attend(&self, x: &Array2<f32>, graph: &MessageGraph) -> AttentionCache {
        let (n, heads, d) = (graph.num_nodes(), self.heads, self.out_dim());
        let h = x.dot(&self.weight.value);

        let mut a_src = Array2::<f32>::zeros((n, heads));
        let mut a_dst = Array2::<f32>::zeros((n, heads));
        for i in 0..n {
            for k in 0..heads {
                let h_ik = h.slice(s![i, k * d..(k + 1) * d]);
                a_src[[i, k]] = h_ik.dot(&self.att_src.value.row(k));
                a_dst[[i, k]] = h_ik.dot(&self.att_dst.value.row(k));
            }
        }

        let mut scores = Array2::<f32>::zeros((graph.num_edges(), heads));
        let mut alpha = Array2::<f32>::zeros((graph.num_edges(), heads));
        for t in 0..n {
            for k in 0..heads {
                let mut max = f32::NEG_INFINITY;
                for e in graph.incoming(t) {
                    let score = a_src[[graph.source(e), k]] + a_dst[[t, k]];
                    scores[[e, k]] = score;
                    max = max.max(leaky_relu(score));
                }

                let mut total = 0.0;
                for e in graph.incoming(t) {
                    let w = (leaky_relu(scores[[e, k]]) - max).exp();
                    alpha[[e, k]] = w;
                    total += w;
                }
                // Every node has its self loop, so total > 0
                for e in graph.incoming(t) {
                    alpha[[e, k]] /= total;
                }
            }
        }

        AttentionCache { x: x.to_owned(), h, scores, alpha }
    }

    fn aggregate(&self, cache: &AttentionCache, graph: &MessageGraph) -> Array2<f32> {
        let (heads, d) = (self.heads, self.out_dim());
        let scale = 1.0 / heads as f32;

        let mut out = Array2::zeros((graph.num_nodes(), d));
        for t in 0..graph.num_nodes() {
            let mut row = out.row_mut(t);
            for k in 0..heads {
                for e in graph.incoming(t) {
                    let h_src = cache.h.slice(s![graph.source(e), k * d..(k + 1) * d]);
                    row.scaled_add(scale * cache.alpha[[e, k]], &h_src);
                }
            }
        }

        out + &self.bias.value
    }

    pub fn forward(&self, x: &Array2<f32>, graph: &MessageGraph) -> Array2<f32> {
        let cache = self.attend(x, graph);
        self.aggregate(&cache, graph)
    }

    fn forward_train(&mut self, x: Array2<f32>, graph: &MessageGraph) -> Array2<f32> {
        let cache = self.attend(&x, graph);
        let out = self.aggregate(&cache, graph);
        self.cache = Some(cache);
        out
    }

    fn backward(&mut self, grad: Array2<f32>, graph: &MessageGraph) -> Result<Array2<f32>, ModelError> {
        let AttentionCache { x, h, scores, alpha } =
            self.cache.take().ok_or(ModelError::MissingForward("gat_conv"))?;
        let (n, heads, d) = (graph.num_nodes(), self.heads, self.out_dim());
        let scale = 1.0 / heads as f32;

        self.bias.accumulate(column_sums(&grad));

        let mut grad_h = Array2::<f32>::zeros(h.raw_dim());
        let mut grad_a_src = Array2::<f32>::zeros((n, heads));
        let mut grad_a_dst = Array2::<f32>::zeros((n, heads));

        for t in 0..n {
            let g_t = grad.row(t);
            for k in 0..heads {
                let cols = k * d..(k + 1) * d;

                // Messages: d out[t] / d h_k[src] = scale * alpha
                let mut grad_alpha = Vec::with_capacity(graph.in_degree(t));
                let mut weighted = 0.0;
                for e in graph.incoming(t) {
                    let src = graph.source(e);
                    let ga = scale * g_t.dot(&h.slice(s![src, cols.clone()]));
                    weighted += alpha[[e, k]] * ga;
                    grad_alpha.push(ga);

                    grad_h
                        .slice_mut(s![src, cols.clone()])
                        .scaled_add(scale * alpha[[e, k]], &g_t);
                }

                // Softmax, then LeakyReLU
                for (e, ga) in graph.incoming(t).zip(grad_alpha) {
                    let grad_score = alpha[[e, k]] * (ga - weighted);
                    let grad_pre = if scores[[e, k]] > 0.0 {
                        grad_score
                    } else {
                        grad_score * LEAKY_RELU_SLOPE
                    };
                    grad_a_src[[graph.source(e), k]] += grad_pre;
                    grad_a_dst[[t, k]] += grad_pre;
                }
            }
        }

        let mut grad_att_src = Array2::<f32>::zeros(self.att_src.value.raw_dim());
        let mut grad_att_dst = Array2::<f32>::zeros(self.att_dst.value.raw_dim());
        for i in 0..n {
            for k in 0..heads {
                let cols = k * d..(k + 1) * d;
                let h_ik = h.slice(s![i, cols.clone()]);
                grad_att_src.row_mut(k).scaled_add(grad_a_src[[i, k]], &h_ik);
                grad_att_dst.row_mut(k).scaled_add(grad_a_dst[[i, k]], &h_ik);

                let mut g = grad_h.slice_mut(s![i, cols]);
                g.scaled_add(grad_a_src[[i, k]], &self.att_src.value.row(k));
                g.scaled_add(grad_a_dst[[i, k]], &self.att_dst.value.row(k));
            }
        }

        self.att_src.accumulate(grad_att_src);
        self.att_dst.accumulate(grad_att_dst);
        self.weight.accumulate(x.t().dot(&grad_h));
        Ok(grad_h.dot(&self.weight.value.t()))
    }
}

// ============================================================================
// LAYER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Linear(Linear),
    BatchNorm(BatchNorm1d),
    Relu(Relu),
    Dropout(Dropout),
    GcnConv(GcnConv),
    GatConv(GatConv),
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Linear(_) => "linear",
            Layer::BatchNorm(_) => "batch_norm",
            Layer::Relu(_) => "relu",
            Layer::Dropout(_) => "dropout",
            Layer::GcnConv(_) => "gcn_conv",
            Layer::GatConv(_) => "gat_conv",
        }
    }

    pub fn forward(&self, x: Array2<f32>, graph: &MessageGraph) -> Array2<f32> {
        match self {
            Layer::Linear(l) => l.forward(&x),
            Layer::BatchNorm(bn) => bn.forward(&x),
            Layer::Relu(_) => x.mapv_into(|v| v.max(0.0)),
            Layer::Dropout(_) => x,
            Layer::GcnConv(conv) => conv.forward(&x, graph),
            Layer::GatConv(att) => att.forward(&x, graph),
        }
    }

    pub fn forward_train(&mut self, x: Array2<f32>, graph: &MessageGraph, rng: &mut StdRng) -> Array2<f32> {
        match self {
            Layer::Linear(l) => l.forward_train(x),
            Layer::BatchNorm(bn) => bn.forward_train(x),
            Layer::Relu(r) => r.forward_train(x),
            Layer::Dropout(d) => d.forward_train(x, rng),
            Layer::GcnConv(conv) => conv.forward_train(x, graph),
            Layer::GatConv(att) => att.forward_train(x, graph),
        }
    }

    pub fn backward(&mut self, grad: Array2<f32>, graph: &MessageGraph) -> Result<Array2<f32>, ModelError> {
        match self {
            Layer::Linear(l) => l.backward(grad),
            Layer::BatchNorm(bn) => bn.backward(grad),
            Layer::Relu(r) => r.backward(grad),
            Layer::Dropout(d) => Ok(d.backward(grad)),
            Layer::GcnConv(conv) => conv.backward(grad, graph),
            Layer::GatConv(att) => att.backward(grad, graph),
        }
    }

    pub fn params(&self) -> Vec<&Param> {
        match self {
            Layer::Linear(l) => vec![&l.weight, &l.bias],
            Layer::BatchNorm(bn) => vec![&bn.gamma, &bn.beta],
            Layer::Relu(_) | Layer::Dropout(_) => Vec::new(),
            Layer::GcnConv(conv) => vec![&conv.weight, &conv.bias],
            Layer::GatConv(att) => vec![&att.weight, &att.att_src, &att.att_dst, &att.bias],
        }
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        match self {
            Layer::Linear(l) => vec![&mut l.weight, &mut l.bias],
            Layer::BatchNorm(bn) => vec![&mut bn.gamma, &mut bn.beta],
            Layer::Relu(_) | Layer::Dropout(_) => Vec::new(),
            Layer::GcnConv(conv) => vec![&mut conv.weight, &mut conv.bias],
            Layer::GatConv(att) => vec![&mut att.weight, &mut att.att_src, &mut att.att_dst, &mut att.bias],
        }
    }

    /// Output width, for layers that change it
    pub fn out_dim(&self) -> Option<usize> {
        match self {
            Layer::Linear(l) => Some(l.out_dim()),
            Layer::BatchNorm(bn) => Some(bn.features()),
            Layer::GcnConv(conv) => Some(conv.out_dim()),
            Layer::GatConv(att) => Some(att.out_dim()),
            Layer::Relu(_) | Layer::Dropout(_) => None,
        }
    }
}
