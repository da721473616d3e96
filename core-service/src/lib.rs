//! PRATIRAKSHA-Lite core
//!
//! Graph construction, the GCN flow classifier (training + inference),
//! the flow simulator and the threat log used by the dashboard server.

pub mod constants;
pub mod logic;

pub use logic::features::FlowRecord;
pub use logic::threat::{ThreatClass, ThreatDetection, ThreatStatus};
