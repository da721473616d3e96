//! Logic Module - Pipeline Stages & Engines
//!
//! ## Offline
//! - `dataset/` - CSV flow tables, stratified sampling, summaries
//! - `graph/` - Scaling, edge construction, message-passing structure
//! - `model/` - NetworkFlowGCN layers, checkpoints, runtime detector
//! - `training/` - Loss, AdamW, LR scheduling, early stopping
//!
//! ## Runtime
//! - `simulator` - Fabricated flow records
//! - `analysis_loop` - Timer-driven monitor (simulate -> score -> log -> emit)
//! - `threat_log/` - SQLite threat store and dashboard stats
//! - `events` - Dashboard event bus

pub mod features;
pub mod threat;
pub mod dataset;
pub mod graph;
pub mod model;
pub mod training;
pub mod simulator;
pub mod threat_log;
pub mod events;
pub mod analysis_loop;
