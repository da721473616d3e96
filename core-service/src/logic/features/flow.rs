//! Flow Record & Runtime Encoding
//!
//! A flow record is the unit the monitor fabricates and the detector scores.
//! `encode_flow` turns one into the fixed `FLOW_FEATURE_LAYOUT` vector,
//! zero-padded to whatever input width the loaded model expects.

use serde::{Deserialize, Serialize};

use super::layout::FEATURE_COUNT;

/// TCP protocol number
pub const PROTO_TCP: u8 = 6;
/// UDP protocol number
pub const PROTO_UDP: u8 = 17;

/// Network flow attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub src_ip: String,
    pub dst_ip: String,
    /// Seconds
    pub duration: f32,
    pub protocol: u8,
    pub src_bytes: f32,
    pub dst_bytes: f32,
    pub packets: u32,
    pub tcp_flags: u8,
    /// Seconds
    pub active_time: f32,
    /// Seconds
    pub idle_time: f32,
}

impl FlowRecord {
    /// Encode with exactly `FEATURE_COUNT` columns
    pub fn features(&self) -> [f32; FEATURE_COUNT] {
        let mut out = [0.0f32; FEATURE_COUNT];

        out[0] = (self.duration / 100.0).min(1.0);
        out[1] = self.protocol as f32 / 17.0;
        out[2] = (self.src_bytes / 50_000.0).min(1.0);
        out[3] = (self.dst_bytes / 50_000.0).min(1.0);
        out[4] = (self.packets as f32 / 200.0).min(1.0);
        out[5] = self.tcp_flags as f32 / 255.0;
        out[6] = (self.active_time / 100.0).min(1.0);
        out[7] = (self.idle_time / 100.0).min(1.0);

        let total_bytes = self.src_bytes + self.dst_bytes;
        if total_bytes > 0.0 {
            out[8] = self.src_bytes / total_bytes;
        }
        if self.packets > 0 {
            let packets = self.packets as f32;
            out[9] = self.src_bytes / packets;
            out[10] = self.dst_bytes / packets;
        }

        out
    }
}

/// Encode a flow into a model input row of width `input_dim`
///
/// Columns past `FEATURE_COUNT` stay zero; a narrower model sees a
/// truncated prefix.
pub fn encode_flow(flow: &FlowRecord, input_dim: usize) -> Vec<f32> {
    let encoded = flow.features();
    let mut row = vec![0.0f32; input_dim];
    let n = input_dim.min(FEATURE_COUNT);
    row[..n].copy_from_slice(&encoded[..n]);
    row
}
