//! Tests for flow encoding and column scaling

use ndarray::array;

use super::flow::{encode_flow, FlowRecord, PROTO_TCP};
use super::layout::FEATURE_COUNT;
use super::scaler::StandardScaler;

fn sample_flow() -> FlowRecord {
    FlowRecord {
        src_ip: "192.168.1.50".to_string(),
        dst_ip: "10.0.0.1".to_string(),
        duration: 25.0,
        protocol: PROTO_TCP,
        src_bytes: 5000.0,
        dst_bytes: 15000.0,
        packets: 50,
        tcp_flags: 24,
        active_time: 15.0,
        idle_time: 5.0,
    }
}

#[test]
fn test_flow_encoding_values() {
    let f = sample_flow().features();

    assert!((f[0] - 0.25).abs() < 1e-6);
    assert!((f[1] - 6.0 / 17.0).abs() < 1e-6);
    assert!((f[2] - 0.1).abs() < 1e-6);
    assert!((f[3] - 0.3).abs() < 1e-6);
    assert!((f[4] - 0.25).abs() < 1e-6);
    assert!((f[8] - 0.25).abs() < 1e-6, "src ratio");
    assert!((f[9] - 100.0).abs() < 1e-3, "src bytes per packet");
    assert!((f[10] - 300.0).abs() < 1e-3, "dst bytes per packet");
}

#[test]
fn test_flow_encoding_caps_and_zero_packets() {
    let mut flow = sample_flow();
    flow.duration = 500.0;
    flow.dst_bytes = 90_000.0;
    let capped = flow.features();
    assert_eq!(capped[0], 1.0);
    assert_eq!(capped[3], 1.0);

    flow.packets = 0;
    flow.src_bytes = 0.0;
    flow.dst_bytes = 0.0;

    let f = flow.features();
    assert_eq!(f[8], 0.0, "no bytes => ratio stays zero");
    assert_eq!(f[9], 0.0);
    assert_eq!(f[10], 0.0);
}

#[test]
fn test_encode_flow_pads_and_truncates() {
    let flow = sample_flow();

    let wide = encode_flow(&flow, 50);
    assert_eq!(wide.len(), 50);
    assert!(wide[FEATURE_COUNT..].iter().all(|&v| v == 0.0));
    assert_eq!(&wide[..FEATURE_COUNT], &flow.features()[..]);

    let narrow = encode_flow(&flow, 4);
    assert_eq!(narrow, flow.features()[..4].to_vec());
}

#[test]
fn test_scaler_zero_mean_unit_variance() {
    let data = array![[1.0f32, 10.0], [3.0, 10.0], [5.0, 10.0]];
    let mut scaler = StandardScaler::new();
    let scaled = scaler.fit_transform(data.view()).unwrap();

    // Column 0: mean 3, population std sqrt(8/3)
    let std = (8.0f32 / 3.0).sqrt();
    assert!((scaled[[0, 0]] + 2.0 / std).abs() < 1e-5);
    assert!(scaled[[1, 0]].abs() < 1e-6);

    // Constant column maps to zero instead of NaN
    assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    assert_eq!(scaler.scale[1], 1.0);
}

#[test]
fn test_scaler_rejects_bad_input() {
    let scaler = StandardScaler::new();
    assert!(scaler.transform(array![[1.0f32]].view()).is_err());

    let mut fitted = StandardScaler::new();
    fitted.fit(array![[1.0f32, 2.0], [2.0, 3.0]].view()).unwrap();
    assert!(fitted.transform(array![[1.0f32, 2.0, 3.0]].view()).is_err());
}
