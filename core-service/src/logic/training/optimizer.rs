//! AdamW with decoupled weight decay, and global-norm gradient clipping

use ndarray::{Array2, Zip};

use crate::logic::model::layers::Param;

pub const DEFAULT_LEARNING_RATE: f32 = 2e-4;
pub const DEFAULT_WEIGHT_DECAY: f32 = 1e-4;
pub const DEFAULT_MAX_GRAD_NORM: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct AdamW {
    pub lr: f32,
    pub weight_decay: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    step: i32,
    /// (first, second) moment per parameter, in `params_mut` order
    moments: Vec<(Array2<f32>, Array2<f32>)>,
}

impl AdamW {
    pub fn new(lr: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            weight_decay,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            step: 0,
            moments: Vec::new(),
        }
    }

    pub fn steps(&self) -> i32 {
        self.step
    }

    pub fn step(&mut self, params: &mut [&mut Param]) {
        if self.moments.len() != params.len() {
            self.moments = params
                .iter()
                .map(|p| (Array2::zeros(p.value.raw_dim()), Array2::zeros(p.value.raw_dim())))
                .collect();
        }

        self.step += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step);
        let bias2 = 1.0 - self.beta2.powi(self.step);
        let (lr, decay, b1, b2, eps) = (self.lr, self.weight_decay, self.beta1, self.beta2, self.eps);

        for (param, (m, v)) in params.iter_mut().zip(self.moments.iter_mut()) {
            if param.grad.dim() != param.value.dim() {
                continue;
            }
            let Param { value, grad } = &mut **param;

            Zip::from(value)
                .and(&*grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    *w *= 1.0 - lr * decay;
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    *w -= lr * (*m / bias1) / ((*v / bias2).sqrt() + eps);
                });
        }
    }
}

/// Scale gradients so their global L2 norm is at most `max_norm`;
/// returns the norm before clipping
pub fn clip_grad_norm(params: &mut [&mut Param], max_norm: f32) -> f32 {
    let total = params
        .iter()
        .map(|p| p.grad.iter().map(|g| g * g).sum::<f32>())
        .sum::<f32>()
        .sqrt();

    if total > max_norm {
        let scale = max_norm / (total + 1e-6);
        for param in params.iter_mut() {
            param.grad *= scale;
        }
    }

    total
}
