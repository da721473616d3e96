//! Reduce the learning rate when validation accuracy plateaus

pub const DEFAULT_LR_FACTOR: f32 = 0.7;
pub const DEFAULT_LR_PATIENCE: usize = 8;
pub const DEFAULT_MIN_LR: f32 = 1e-6;
/// Relative improvement needed to reset patience
pub const DEFAULT_THRESHOLD: f32 = 1e-4;

/// Mode "max": higher metric is better
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    pub factor: f32,
    pub patience: usize,
    pub min_lr: f32,
    pub threshold: f32,
    best: f32,
    bad_epochs: usize,
}

impl Default for ReduceLrOnPlateau {
    fn default() -> Self {
        Self::new(DEFAULT_LR_FACTOR, DEFAULT_LR_PATIENCE, DEFAULT_MIN_LR)
    }
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f32, patience: usize, min_lr: f32) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            threshold: DEFAULT_THRESHOLD,
            best: f32::NEG_INFINITY,
            bad_epochs: 0,
        }
    }

    pub fn best(&self) -> f32 {
        self.best
    }

    /// Feed one epoch's metric; returns the learning rate to use next
    pub fn step(&mut self, metric: f32, lr: f32) -> f32 {
        if metric > self.best * (1.0 + self.threshold) {
            self.best = metric;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs <= self.patience {
            return lr;
        }

        self.bad_epochs = 0;
        let reduced = (lr * self.factor).max(self.min_lr);
        if lr - reduced > 1e-8 {
            log::info!("Reducing learning rate to {:.4e}", reduced);
            reduced
        } else {
            lr
        }
    }
}
