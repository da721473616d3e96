//! Training Module - GCN Training Loop
//!
//! ## Structure
//! - `loss`: masked softmax cross-entropy
//! - `optimizer`: AdamW and gradient clipping
//! - `scheduler`: ReduceLROnPlateau on validation accuracy
//! - `trainer`: epochs, early stopping, best-weight restore
//! - `pipeline`: CSV to checkpoint, as run by `pratiraksha train`

pub mod loss;
pub mod optimizer;
pub mod scheduler;
pub mod trainer;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use optimizer::{clip_grad_norm, AdamW};
pub use pipeline::{train_from_csv, train_on_table, TrainingConfig, TrainingError, TrainingReport};
pub use scheduler::ReduceLrOnPlateau;
pub use trainer::{GraphData, TrainOutcome, Trainer, TrainerConfig, TrainingHistory};
