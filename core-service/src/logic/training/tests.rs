use ndarray::{array, Array2};
use tempfile::tempdir;

use super::loss::{cross_entropy, masked_metrics};
use super::*;
use crate::logic::dataset::FlowTable;
use crate::logic::features::{FlowRecord, FEATURE_COUNT, FLOW_FEATURE_LAYOUT};
use crate::logic::graph::{DataSplit, EdgeStrategy, GraphBuilder};
use crate::logic::model::info::DEFAULT_STATUS;
use crate::logic::model::layers::Param;
use crate::logic::model::{GcnConfig, ModelInfo, NetworkFlowGcn, ThreatDetector};
use crate::logic::threat::ThreatClass;

// ============================================================================
// LOSS
// ============================================================================

#[test]
fn test_cross_entropy_uniform_logits() {
    let logits = Array2::<f32>::zeros((3, 2));
    let labels = vec![0, 1, 1];

    let (metrics, grad) = cross_entropy(&logits, &labels, &[0, 1]);
    assert!((metrics.loss - 2f32.ln()).abs() < 1e-6);

    // (softmax - onehot) / |rows|; masked-out row stays zero
    assert_eq!(grad, array![[-0.25f32, 0.25], [0.25, -0.25], [0.0, 0.0]]);
}

#[test]
fn test_masked_metrics_accuracy() {
    let logits = array![[2.0f32, 0.0], [0.0, 3.0], [1.0, 0.0]];
    let labels = vec![0, 1, 1];

    assert_eq!(masked_metrics(&logits, &labels, &[0, 1]).accuracy, 1.0);
    assert!((masked_metrics(&logits, &labels, &[0, 1, 2]).accuracy - 2.0 / 3.0).abs() < 1e-6);
    assert_eq!(masked_metrics(&logits, &labels, &[]).loss, 0.0);
}

// ============================================================================
// OPTIMIZER & SCHEDULER
// ============================================================================

#[test]
fn test_adamw_minimises_quadratic() {
    let mut param = Param::new(array![[0.0f32]]);
    let mut optimizer = AdamW::new(0.1, 0.0);

    for _ in 0..500 {
        let w = param.value[[0, 0]];
        param.grad = array![[2.0 * (w - 3.0)]];
        optimizer.step(&mut [&mut param]);
    }

    assert!((param.value[[0, 0]] - 3.0).abs() < 0.2);
    assert_eq!(optimizer.steps(), 500);
}

#[test]
fn test_adamw_decay_shrinks_weights_without_gradient() {
    let mut param = Param::new(array![[1.0f32]]);
    let mut optimizer = AdamW::new(0.1, 0.5);
    optimizer.step(&mut [&mut param]);

    assert!((param.value[[0, 0]] - 0.95).abs() < 1e-6);
}

#[test]
fn test_clip_grad_norm() {
    let mut a = Param::new(array![[0.0f32, 0.0]]);
    let mut b = Param::new(array![[0.0f32]]);
    a.grad = array![[3.0, 0.0]];
    b.grad = array![[4.0]];

    let norm = clip_grad_norm(&mut [&mut a, &mut b], 1.0);
    assert!((norm - 5.0).abs() < 1e-6);

    let clipped = (a.grad.mapv(|g| g * g).sum() + b.grad.mapv(|g| g * g).sum()).sqrt();
    assert!((clipped - 1.0).abs() < 1e-4);

    // Under the limit: untouched
    let before = a.grad.clone();
    clip_grad_norm(&mut [&mut a], 10.0);
    assert_eq!(a.grad, before);
}

#[test]
fn test_plateau_scheduler_reduces_after_patience() {
    let mut scheduler = ReduceLrOnPlateau::new(0.5, 2, 0.3);
    let mut lr = 1.0;

    // First step sets the best; three stale epochs exceed patience 2
    for _ in 0..3 {
        lr = scheduler.step(0.5, lr);
        assert_eq!(lr, 1.0);
    }
    lr = scheduler.step(0.5, lr);
    assert_eq!(lr, 0.5);

    // Improvement resets the counter
    lr = scheduler.step(0.9, lr);
    assert_eq!(lr, 0.5);
    assert_eq!(scheduler.best(), 0.9);

    // Floors at min_lr, then stays
    for _ in 0..3 {
        lr = scheduler.step(0.1, lr);
    }
    assert_eq!(lr, 0.3);
    for _ in 0..3 {
        lr = scheduler.step(0.1, lr);
    }
    assert_eq!(lr, 0.3);
}

// ============================================================================
// TRAINER
// ============================================================================

/// Two well separated clusters, 20 rows each
fn cluster_table() -> FlowTable {
    let features = Array2::from_shape_fn((40, 2), |(i, j)| {
        let centre = if i % 2 == 0 { -3.0 } else { 3.0 };
        centre + ((i * 2 + j) as f32 * 0.91).sin() * 0.5
    });
    let labels = (0..40).map(|i| if i % 2 == 0 { "A" } else { "B" }.to_string()).collect();
    FlowTable::new(vec!["x".to_string(), "y".to_string()], features, labels).unwrap()
}

fn cluster_data() -> (GraphData, GcnConfig) {
    let mut builder = GraphBuilder::new(EdgeStrategy::Knn { k: 3 });
    let graph = builder.create_graph_from_flows(&cluster_table()).unwrap();
    let split = DataSplit::random(graph.num_nodes(), 0.7, 0.15, 1);

    let config = GcnConfig {
        hidden_dim: 64,
        dropout: 0.0,
        ..GcnConfig::new(graph.num_features(), graph.num_classes())
    };
    (GraphData::new(&graph, split), config)
}

#[test]
fn test_training_reduces_loss() {
    let (data, config) = cluster_data();
    let model = NetworkFlowGcn::new(config, 3).unwrap();

    let mut trainer = Trainer::new(
        model,
        TrainerConfig { lr: 1e-2, epochs: 60, patience: 60, ..TrainerConfig::default() },
    );
    let outcome = trainer.train(&data).unwrap();

    let history = trainer.history();
    assert_eq!(history.epochs(), outcome.epochs_run);
    assert_eq!(history.lr.len(), history.epochs());

    let first = history.train_loss[0];
    let last = *history.train_loss.last().unwrap();
    assert!(last < first, "loss {} -> {}", first, last);
    assert!(outcome.best_val_acc > 0.0);

    let test_acc = trainer.test(&data);
    assert!((0.0..=1.0).contains(&test_acc));
}

#[test]
fn test_early_stopping_without_learning() {
    let (data, config) = cluster_data();
    let model = NetworkFlowGcn::new(config, 3).unwrap();

    // lr 0: weights never move, so validation accuracy plateaus
    let mut trainer = Trainer::new(
        model,
        TrainerConfig { lr: 0.0, epochs: 50, patience: 1, ..TrainerConfig::default() },
    );
    let outcome = trainer.train(&data).unwrap();

    assert!(outcome.stopped_early);
    assert!(outcome.epochs_run < 50);
}

// ============================================================================
// PIPELINE
// ============================================================================

fn flow(duration: f32, src_bytes: f32, packets: u32) -> FlowRecord {
    FlowRecord {
        src_ip: "192.168.1.2".to_string(),
        dst_ip: "10.0.1.1".to_string(),
        duration,
        protocol: 6,
        src_bytes,
        dst_bytes: 5000.0,
        packets,
        tcp_flags: 16,
        active_time: duration / 2.0,
        idle_time: 5.0,
    }
}

#[test]
fn test_pipeline_writes_loadable_model() {
    let dir = tempdir().unwrap();

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for i in 0..30 {
        let jitter = i as f32;
        if i % 2 == 0 {
            rows.extend(flow(10.0 + jitter * 0.3, 2000.0 + jitter * 50.0, 20 + i).features());
            labels.push(ThreatClass::Benign.as_str().to_string());
        } else {
            rows.extend(flow(80.0 + jitter * 0.3, 40_000.0 + jitter * 100.0, 170 + i).features());
            labels.push(ThreatClass::Ransomware.as_str().to_string());
        }
    }
    let table = FlowTable::new(
        FLOW_FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        Array2::from_shape_vec((30, FEATURE_COUNT), rows).unwrap(),
        labels,
    )
    .unwrap();

    let config = TrainingConfig {
        hidden_dim: 16,
        dropout: 0.0,
        trainer: TrainerConfig { lr: 1e-2, epochs: 5, patience: 5, ..TrainerConfig::default() },
        output_dir: dir.path().join("models"),
        ..TrainingConfig::default()
    };
    let report = train_on_table(&table, &config).unwrap();

    assert_eq!(report.class_names, vec!["Benign", "Ransomware"]);
    assert!(report.epochs_run <= 5);
    assert!(report.checkpoint_path.exists());

    let info = ModelInfo::load(&report.model_info_path).unwrap();
    assert_eq!(info.checkpoint_sha256.as_deref(), Some(report.checkpoint_sha256.as_str()));
    assert_eq!(info.parameter_count, report.parameter_count);
    assert_eq!(info.input_dims, Some(FEATURE_COUNT));
    assert_eq!(info.status.as_deref(), Some(DEFAULT_STATUS));
    assert!((info.accuracy_percentage - report.test_accuracy * 100.0).abs() < 1e-4);

    let detector = ThreatDetector::load(&report.checkpoint_path, Some(&info)).unwrap();
    let detection = detector.detect(&flow(12.0, 2500.0, 25)).unwrap();
    assert!((0.5..=0.99).contains(&detection.confidence));
}
