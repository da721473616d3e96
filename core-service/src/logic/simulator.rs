//! Flow Simulator
//!
//! Fabricates labelled flow records for the live monitor and for demo
//! datasets. Each class draws from its own traffic profile on top of a
//! uniform base flow.

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::logic::features::flow::{PROTO_TCP, PROTO_UDP};
use crate::logic::features::FlowRecord;
use crate::logic::threat::ThreatClass;

/// Draw weights in `ThreatClass::ALL` order
pub const CLASS_WEIGHTS: [u32; 5] = [2, 8, 8, 20, 10];

/// Seeded, reproducible flow source
pub struct FlowSimulator {
    rng: StdRng,
}

impl FlowSimulator {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn next_flow(&mut self) -> (FlowRecord, ThreatClass) {
        simulate_flow(&mut self.rng)
    }
}

impl Iterator for FlowSimulator {
    type Item = (FlowRecord, ThreatClass);

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_flow())
    }
}

/// Weighted class draw
pub fn draw_class<R: Rng + ?Sized>(rng: &mut R) -> ThreatClass {
    let total: u32 = CLASS_WEIGHTS.iter().sum();
    let mut ticket = rng.gen_range(0..total);

    for (class, &weight) in ThreatClass::ALL.iter().zip(CLASS_WEIGHTS.iter()) {
        if ticket < weight {
            return *class;
        }
        ticket -= weight;
    }
    ThreatClass::Ransomware
}

/// One flow with a class drawn by `CLASS_WEIGHTS`
pub fn simulate_flow<R: Rng + ?Sized>(rng: &mut R) -> (FlowRecord, ThreatClass) {
    let class = draw_class(rng);
    (simulate_class(class, rng), class)
}

/// Uniform base flow before any class profile is applied
pub fn base_flow<R: Rng + ?Sized>(rng: &mut R) -> FlowRecord {
    FlowRecord {
        src_ip: format!("192.168.{}.{}", rng.gen_range(1..=254), rng.gen_range(2..=254)),
        dst_ip: format!("10.0.{}.{}", rng.gen_range(1..=254), rng.gen_range(1..=254)),
        duration: rng.gen_range(0.0..100.0),
        protocol: pick(rng, &[PROTO_TCP, PROTO_UDP]),
        src_bytes: rng.gen_range(0.0..50_000.0),
        dst_bytes: rng.gen_range(0.0..50_000.0),
        packets: rng.gen_range(1..=200),
        tcp_flags: rng.gen(),
        active_time: rng.gen_range(0.0..100.0),
        idle_time: rng.gen_range(0.0..100.0),
    }
}

/// A flow shaped like `class` traffic
pub fn simulate_class<R: Rng + ?Sized>(class: ThreatClass, rng: &mut R) -> FlowRecord {
    let mut flow = base_flow(rng);

    match class {
        ThreatClass::Ransomware => {
            flow.duration = rng.gen_range(70.0..95.0);
            flow.src_bytes = rng.gen_range(35_000.0..50_000.0);
            flow.dst_bytes = rng.gen_range(10_000.0..30_000.0);
            flow.packets = rng.gen_range(140..=200);
            flow.active_time = rng.gen_range(60.0..95.0);
            flow.protocol = PROTO_TCP;
            flow.tcp_flags = pick(rng, &[16, 24, 25]);
        }
        ThreatClass::Cryptolocker => {
            flow.duration = rng.gen_range(50.0..85.0);
            flow.src_bytes = rng.gen_range(25_000.0..45_000.0);
            flow.dst_bytes = rng.gen_range(8_000.0..25_000.0);
            flow.packets = rng.gen_range(100..=160);
            flow.protocol = PROTO_TCP;
            flow.tcp_flags = pick(rng, &[16, 24]);
            flow.active_time = rng.gen_range(45.0..80.0);
        }
        ThreatClass::Locky => {
            flow.duration = rng.gen_range(40.0..75.0);
            flow.src_bytes = rng.gen_range(20_000.0..40_000.0);
            flow.dst_bytes = rng.gen_range(5_000.0..20_000.0);
            flow.packets = rng.gen_range(80..=140);
            flow.active_time = rng.gen_range(35.0..70.0);
        }
        ThreatClass::WannaCry => {
            flow.duration = rng.gen_range(60.0..90.0);
            flow.src_bytes = rng.gen_range(30_000.0..48_000.0);
            flow.dst_bytes = rng.gen_range(12_000.0..32_000.0);
            flow.packets = rng.gen_range(120..=180);
            flow.protocol = pick(rng, &[PROTO_TCP, PROTO_UDP]);
            flow.tcp_flags = pick(rng, &[16, 17, 24, 25]);
            flow.active_time = rng.gen_range(50.0..85.0);
        }
        ThreatClass::Benign => {
            flow.duration = rng.gen_range(5.0..30.0);
            flow.src_bytes = rng.gen_range(100.0..8_000.0);
            flow.dst_bytes = rng.gen_range(500.0..12_000.0);
            flow.packets = rng.gen_range(5..=50);
            flow.active_time = rng.gen_range(5.0..25.0);
        }
    }

    flow
}

fn pick<R: Rng + ?Sized>(rng: &mut R, choices: &[u8]) -> u8 {
    choices.choose(rng).copied().unwrap_or_default()
}
