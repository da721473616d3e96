use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use super::checkpoint::Checkpoint;
use super::inference::{detect_or_fallback, METHOD_FALLBACK, METHOD_GCN};
use super::layers::{BatchNorm1d, GatConv, GcnConv, Layer, Linear};
use super::network::{softmax_rows, GcnConfig, NetworkFlowGcn};
use super::{ModelError, ModelInfo, ThreatDetector};
use crate::logic::dataset::FlowTable;
use crate::logic::features::{FlowRecord, FEATURE_COUNT, FLOW_FEATURE_LAYOUT};
use crate::logic::graph::{EdgeStrategy, GraphBuilder, MessageGraph};
use crate::logic::threat::ThreatClass;

/// Deterministic, irregular values in -0.8..0.8
fn fill(rows: usize, cols: usize, salt: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(i, j)| ((i * cols + j + salt) as f32 * 1.7).sin() * 0.8)
}

fn small_graph() -> MessageGraph {
    MessageGraph::new(4, &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)])
}

/// `sum(layer(x) * weights)` in training mode
fn objective(layer: &mut Layer, x: &Array2<f32>, graph: &MessageGraph, weights: &Array2<f32>) -> f32 {
    let mut rng = StdRng::seed_from_u64(0);
    (layer.forward_train(x.clone(), graph, &mut rng) * weights).sum()
}

fn assert_close(analytic: f32, numeric: f32, what: &str) {
    let tolerance = 2e-2 * analytic.abs().max(numeric.abs()).max(1.0);
    assert!(
        (analytic - numeric).abs() <= tolerance,
        "{}: analytic {} vs numeric {}",
        what,
        analytic,
        numeric
    );
}

/// Central differences against `backward` for the input and every parameter
fn check_gradients(mut layer: Layer, x: Array2<f32>, graph: &MessageGraph, eps: f32) {
    let mut rng = StdRng::seed_from_u64(0);
    let out = layer.forward_train(x.clone(), graph, &mut rng);
    let weights = fill(out.nrows(), out.ncols(), 3);

    for param in layer.params_mut() {
        param.zero_grad();
    }
    let grad_x = layer.backward(weights.clone(), graph).unwrap();
    let name = layer.name();

    let mut perturbed = x.clone();
    for idx in 0..x.len() {
        let (i, j) = (idx / x.ncols(), idx % x.ncols());
        perturbed[[i, j]] = x[[i, j]] + eps;
        let plus = objective(&mut layer, &perturbed, graph, &weights);
        perturbed[[i, j]] = x[[i, j]] - eps;
        let minus = objective(&mut layer, &perturbed, graph, &weights);
        perturbed[[i, j]] = x[[i, j]];

        assert_close(grad_x[[i, j]], (plus - minus) / (2.0 * eps), &format!("{} input[{},{}]", name, i, j));
    }

    let analytic: Vec<Array2<f32>> = layer.params().iter().map(|p| p.grad.clone()).collect();
    for (p, grad) in analytic.iter().enumerate() {
        for ((i, j), &g) in grad.indexed_iter() {
            let original = layer.params()[p].value[[i, j]];

            layer.params_mut()[p].value[[i, j]] = original + eps;
            let plus = objective(&mut layer, &x, graph, &weights);
            layer.params_mut()[p].value[[i, j]] = original - eps;
            let minus = objective(&mut layer, &x, graph, &weights);
            layer.params_mut()[p].value[[i, j]] = original;

            assert_close(g, (plus - minus) / (2.0 * eps), &format!("{} param {}[{},{}]", name, p, i, j));
        }
    }
}

// ============================================================================
// GRADIENT CHECKS
// ============================================================================

#[test]
fn test_linear_gradients() {
    let mut rng = StdRng::seed_from_u64(1);
    let layer = Layer::Linear(Linear::new(3, 2, &mut rng));
    check_gradients(layer, fill(4, 3, 0), &small_graph(), 1e-2);
}

#[test]
fn test_batch_norm_gradients() {
    let mut bn = BatchNorm1d::new(3);
    bn.gamma.value = fill(1, 3, 11) + 1.0;
    bn.beta.value = fill(1, 3, 17);
    check_gradients(Layer::BatchNorm(bn), fill(4, 3, 5) * 2.0, &small_graph(), 1e-2);
}

#[test]
fn test_gcn_gradients() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut conv = GcnConv::new(3, 2, &mut rng);
    conv.bias.value = fill(1, 2, 23);
    check_gradients(Layer::GcnConv(conv), fill(4, 3, 0), &small_graph(), 1e-2);
}

#[test]
fn test_attention_gradients() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut att = GatConv::new(3, 2, 2, &mut rng);
    // Chosen so no attention score sits near the LeakyReLU kink
    att.weight.value = fill(3, 4, 43);
    att.att_src.value = fill(2, 2, 47);
    att.att_dst.value = fill(2, 2, 37);
    check_gradients(Layer::GatConv(att), fill(4, 3, 0), &small_graph(), 5e-3);
}

#[test]
fn test_backward_without_forward_fails() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut layer = Layer::Linear(Linear::new(2, 2, &mut rng));
    let result = layer.backward(Array2::zeros((1, 2)), &MessageGraph::single());
    assert!(matches!(result, Err(ModelError::MissingForward("linear"))));
}

#[test]
fn test_attention_rows_are_convex_mix() {
    // One head, identity projection: output rows stay inside the input hull
    let mut rng = StdRng::seed_from_u64(5);
    let mut att = GatConv::new(2, 2, 1, &mut rng);
    att.weight.value = Array2::eye(2);

    let x = array![[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    let out = Layer::GatConv(att).forward(x, &small_graph());
    for v in out.iter() {
        assert!((-1e-6..=1.0 + 1e-6).contains(v));
    }
}

// ============================================================================
// NETWORK
// ============================================================================

fn tiny_config() -> GcnConfig {
    GcnConfig {
        input_dim: FEATURE_COUNT,
        hidden_dim: 16,
        num_classes: 5,
        dropout: 0.0,
        heads: 4,
    }
}

#[test]
fn test_config_validation() {
    assert!(tiny_config().validate().is_ok());

    let mut bad = tiny_config();
    bad.hidden_dim = 24;
    assert!(matches!(bad.validate(), Err(ModelError::Config(_))));

    let mut bad = tiny_config();
    bad.dropout = 1.0;
    assert!(bad.validate().is_err());

    let mut bad = tiny_config();
    bad.num_classes = 0;
    assert!(bad.validate().is_err());
}

#[test]
fn test_network_shapes_and_parameter_count() {
    let model = NetworkFlowGcn::new(tiny_config(), 42).unwrap();

    // input+bn 224, conv+bn 304 + 304 + 152 + 44, attention 100, classifier 14 + 5 + 10
    assert_eq!(model.parameter_count(), 1157);

    let graph = small_graph();
    let logits = model.forward(&fill(4, FEATURE_COUNT, 0), &graph);
    assert_eq!(logits.dim(), (4, 5));

    let probs = softmax_rows(&logits);
    for row in probs.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_same_seed_same_weights() {
    let a = NetworkFlowGcn::new(tiny_config(), 7).unwrap();
    let b = NetworkFlowGcn::new(tiny_config(), 7).unwrap();
    let x = fill(4, FEATURE_COUNT, 1);
    assert_eq!(a.forward(&x, &small_graph()), b.forward(&x, &small_graph()));
}

#[test]
fn test_predict_threat_averages_nodes() {
    let model = NetworkFlowGcn::new(tiny_config(), 42).unwrap();
    let prediction = model.predict_threat(&fill(4, FEATURE_COUNT, 2), &small_graph()).unwrap();

    assert_eq!(prediction.probabilities.len(), 5);
    let total: f32 = prediction.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-5);

    let max = prediction.probabilities.iter().cloned().fold(f32::MIN, f32::max);
    assert_eq!(prediction.confidence, max);
    assert_eq!(prediction.probabilities[prediction.class_index], max);

    let wrong_width = fill(4, 3, 0);
    assert!(matches!(
        model.predict_threat(&wrong_width, &small_graph()),
        Err(ModelError::Shape(_))
    ));
}

#[test]
fn test_training_forward_backward_runs() {
    let mut model = NetworkFlowGcn::new(GcnConfig { dropout: 0.2, ..tiny_config() }, 42).unwrap();
    let graph = small_graph();
    let mut rng = StdRng::seed_from_u64(9);

    model.zero_grad();
    let logits = model.forward_train(&fill(4, FEATURE_COUNT, 0), &graph, &mut rng);
    model.backward(fill(4, 5, 1) * 0.1, &graph).unwrap();

    assert_eq!(logits.dim(), (4, 5));
    let grad_norm: f32 = model.params().iter().map(|p| p.grad.mapv(|g| g * g).sum()).sum();
    assert!(grad_norm > 0.0 && grad_norm.is_finite());
}

// ============================================================================
// CHECKPOINT & DETECTOR
// ============================================================================

fn flow(duration: f32, src_bytes: f32, packets: u32) -> FlowRecord {
    FlowRecord {
        src_ip: "192.168.10.20".to_string(),
        dst_ip: "10.0.5.6".to_string(),
        duration,
        protocol: 6,
        src_bytes,
        dst_bytes: 9000.0,
        packets,
        tcp_flags: 24,
        active_time: duration * 0.8,
        idle_time: 10.0,
    }
}

/// Fitted builder over the runtime layout with the given labels
fn fitted_builder(labels: &[&str]) -> GraphBuilder {
    let flows = [flow(10.0, 2000.0, 20), flow(80.0, 45_000.0, 180), flow(55.0, 30_000.0, 120)];
    let rows: Vec<f32> = (0..labels.len()).flat_map(|i| flows[i % flows.len()].features()).collect();
    let table = FlowTable::new(
        FLOW_FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        Array2::from_shape_vec((labels.len(), FEATURE_COUNT), rows).unwrap(),
        labels.iter().map(|s| s.to_string()).collect(),
    )
    .unwrap();

    let mut builder = GraphBuilder::new(EdgeStrategy::default());
    builder.create_graph_from_flows(&table).unwrap();
    builder
}

#[test]
fn test_checkpoint_roundtrip_and_checksum() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("models").join("gcn.json");

    let builder = fitted_builder(&["Benign", "Ransomware", "Locky"]);
    let config = GcnConfig { num_classes: 3, ..tiny_config() };
    let model = NetworkFlowGcn::new(config, 42).unwrap();

    let checkpoint = Checkpoint::new(&model, &builder);
    assert!(checkpoint.layout.is_some());
    let checksum = checkpoint.save(&path).unwrap();
    assert_eq!(checksum.len(), 64);

    let loaded = Checkpoint::load(&path, Some(&checksum)).unwrap();
    let (restored, restored_builder) = loaded.into_parts().unwrap();
    assert_eq!(restored_builder.class_names(), builder.class_names());
    assert_eq!(restored_builder.scaler(), builder.scaler());

    let x = fill(4, FEATURE_COUNT, 0);
    let graph = small_graph();
    assert_eq!(restored.forward(&x, &graph), model.forward(&x, &graph));

    let tampered = "0".repeat(64);
    assert!(matches!(
        Checkpoint::load(&path, Some(&tampered)),
        Err(ModelError::Checksum { .. })
    ));
}

#[test]
fn test_detector_scores_flow() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gcn.json");

    let builder = fitted_builder(&["Benign", "Ransomware", "Locky"]);
    let model = NetworkFlowGcn::new(GcnConfig { num_classes: 3, ..tiny_config() }, 42).unwrap();
    let checksum = Checkpoint::new(&model, &builder).save(&path).unwrap();

    let info = ModelInfo {
        checkpoint_sha256: Some(checksum),
        ..ModelInfo::default()
    };
    let detector = ThreatDetector::load(&path, Some(&info)).unwrap();
    assert_eq!(
        detector.classes(),
        &[ThreatClass::Benign, ThreatClass::Locky, ThreatClass::Ransomware]
    );

    let detection = detector.detect(&flow(20.0, 3000.0, 30)).unwrap();
    assert_eq!(detection.method, METHOD_GCN);
    assert_eq!(detection.source_ip, "192.168.10.20");
    assert!((0.5..=0.99).contains(&detection.confidence));
    assert_eq!(detection.status, detection.threat_type.status());

    // Benign predictions on heavy flows are overridden
    let heavy = detector.detect(&flow(90.0, 48_000.0, 190)).unwrap();
    assert!(heavy.is_threat());

    let status = detector.status();
    assert!(status.model_loaded);
    assert_eq!(status.inference_count, 2);
}

#[test]
fn test_detector_rejects_unknown_classes() {
    let builder = fitted_builder(&["Benign", "Petya"]);
    let model = NetworkFlowGcn::new(GcnConfig { num_classes: 2, ..tiny_config() }, 1).unwrap();
    assert!(matches!(
        ThreatDetector::new(model, builder, "test".to_string()),
        Err(ModelError::Config(_))
    ));
}

#[test]
fn test_fallback_without_model() {
    let mut rng = StdRng::seed_from_u64(3);

    let benign = detect_or_fallback(None, &flow(10.0, 2000.0, 20), Some(ThreatClass::Benign), &mut rng);
    assert_eq!(benign.method, METHOD_FALLBACK);
    assert_eq!(benign.threat_type, ThreatClass::Benign);
    assert_eq!(benign.confidence, 0.95);

    let labelled = detect_or_fallback(None, &flow(10.0, 2000.0, 20), Some(ThreatClass::WannaCry), &mut rng);
    assert_eq!(labelled.threat_type, ThreatClass::WannaCry);
    assert!((0.75..0.98).contains(&labelled.confidence));

    let unlabelled = detect_or_fallback(None, &flow(75.0, 2000.0, 20), None, &mut rng);
    assert_eq!(unlabelled.threat_type, ThreatClass::Ransomware);
}

#[test]
fn test_failing_detector_falls_back() {
    // Model width disagrees with the scaler, so every flow fails to encode
    let builder = fitted_builder(&["Benign", "Ransomware"]);
    let config = GcnConfig { input_dim: FEATURE_COUNT + 3, num_classes: 2, ..tiny_config() };
    let model = NetworkFlowGcn::new(config, 5).unwrap();
    let detector = ThreatDetector::new(model, builder, "mismatched".to_string()).unwrap();

    let heavy = flow(85.0, 2000.0, 20);
    assert!(detector.detect(&heavy).is_err());

    let mut rng = StdRng::seed_from_u64(9);
    let detection = detect_or_fallback(Some(&detector), &heavy, None, &mut rng);
    assert_eq!(detection.method, METHOD_FALLBACK);
    assert_eq!(detection.threat_type, ThreatClass::Ransomware);
    assert_eq!(detector.status().inference_count, 0);
}

#[test]
fn test_model_info_defaults_and_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model_info.json");

    let defaults = ModelInfo::load_or_default(&path);
    assert_eq!(defaults.model_architecture, "GCN-Threat-Detector");
    assert_eq!(defaults.parameter_count, 452_485);
    assert_eq!(defaults.status.as_deref(), Some("Running"));

    std::fs::write(&path, "{ not json").unwrap();
    assert_eq!(ModelInfo::load_or_default(&path), ModelInfo::default());

    let info = ModelInfo {
        accuracy_percentage: 91.5,
        class_labels: vec!["Benign".to_string()],
        ..ModelInfo::default()
    };
    info.save(&path).unwrap();
    assert_eq!(ModelInfo::load(&path).unwrap(), info);
}
