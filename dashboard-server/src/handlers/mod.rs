//! HTTP handlers

pub mod health;
pub mod stats;
pub mod threats;
pub mod model;
pub mod detect;
pub mod ws;
