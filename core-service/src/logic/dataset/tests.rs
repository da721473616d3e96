use std::fs;
use std::path::Path;

use ndarray::array;
use tempfile::tempdir;

use super::summary::summarize;
use super::{load_with_fallback, DatasetError, DatasetWriter, FlowTable, LABEL_COLUMN};
use crate::logic::features::{FlowRecord, FEATURE_COUNT};
use crate::logic::threat::ThreatClass;

fn write_csv(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
}

#[test]
fn test_load_csv_with_label_in_middle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flows.csv");
    write_csv(&path, "a,Label,b\n1.5,Benign,2\n3,Locky,4.25\n");

    let table = FlowTable::from_csv(&path, LABEL_COLUMN, None).unwrap();
    assert_eq!(table.feature_names, vec!["a", "b"]);
    assert_eq!(table.features, array![[1.5f32, 2.0], [3.0, 4.25]]);
    assert_eq!(table.labels, vec!["Benign", "Locky"]);
}

#[test]
fn test_load_csv_respects_nrows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flows.csv");
    write_csv(&path, "x,Label\n1,A\n2,B\n3,C\n");

    let table = FlowTable::from_csv(&path, LABEL_COLUMN, Some(2)).unwrap();
    assert_eq!(table.len(), 2);
}

#[test]
fn test_load_csv_errors() {
    let dir = tempdir().unwrap();

    let no_label = dir.path().join("no_label.csv");
    write_csv(&no_label, "x,y\n1,2\n");
    assert!(matches!(
        FlowTable::from_csv(&no_label, LABEL_COLUMN, None),
        Err(DatasetError::MissingLabel(_))
    ));

    let bad_cell = dir.path().join("bad.csv");
    write_csv(&bad_cell, "x,Label\n1,A\nabc,B\n");
    match FlowTable::from_csv(&bad_cell, LABEL_COLUMN, None) {
        Err(DatasetError::Parse { row, column, value }) => {
            assert_eq!(row, 3);
            assert_eq!(column, "x");
            assert_eq!(value, "abc");
        }
        other => panic!("expected parse error, got {:?}", other),
    }

    let empty = dir.path().join("empty.csv");
    write_csv(&empty, "x,Label\n");
    assert!(matches!(
        FlowTable::from_csv(&empty, LABEL_COLUMN, None),
        Err(DatasetError::Empty(_))
    ));
}

#[test]
fn test_fallback_path_is_used_when_primary_missing() {
    let dir = tempdir().unwrap();
    let fallback = dir.path().join("raw.csv");
    write_csv(&fallback, "x,Label\n1,A\n");

    let table = load_with_fallback(
        &dir.path().join("balanced.csv"),
        Some(&fallback),
        LABEL_COLUMN,
        None,
    )
    .unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn test_stratified_sample_preserves_proportions() {
    // 60 A, 30 B, 10 C -> sample 20 => 12 / 6 / 2
    let mut labels = Vec::new();
    labels.extend(std::iter::repeat("A".to_string()).take(60));
    labels.extend(std::iter::repeat("B".to_string()).take(30));
    labels.extend(std::iter::repeat("C".to_string()).take(10));
    let features = ndarray::Array2::from_shape_fn((100, 1), |(i, _)| i as f32);
    let table = FlowTable::new(vec!["x".to_string()], features, labels).unwrap();

    let sample = table.stratified_sample(20, 42);
    assert_eq!(sample.len(), 20);

    let counts = sample.class_counts();
    assert_eq!(counts["A"], 12);
    assert_eq!(counts["B"], 6);
    assert_eq!(counts["C"], 2);

    // Deterministic for a fixed seed
    assert_eq!(sample, table.stratified_sample(20, 42));

    // Rows keep their labels
    for (row, label) in sample.features.column(0).iter().zip(&sample.labels) {
        let original = *row as usize;
        assert_eq!(&table.labels[original], label);
    }
}

#[test]
fn test_stratified_sample_remainders_fill_total() {
    let labels: Vec<String> = (0..10).map(|i| ["A", "B", "C"][i % 3].to_string()).collect();
    let features = ndarray::Array2::zeros((10, 1));
    let table = FlowTable::new(vec!["x".to_string()], features, labels).unwrap();

    assert_eq!(table.stratified_sample(5, 1).len(), 5);
    assert_eq!(table.stratified_sample(50, 1).len(), 10);
}

#[test]
fn test_summary_counts() {
    let table = FlowTable::new(
        vec!["x".to_string(), "flat".to_string()],
        array![[1.0f32, 7.0], [1.0, 7.0], [2.0, 7.0], [3.0, 7.0]],
        vec!["A".into(), "A".into(), "B".into(), "B".into()],
    )
    .unwrap();

    let summary = summarize(&table, "Family", 4.0);
    assert_eq!(summary.label_column, "Family");
    assert_eq!(summary.rows, 4);
    assert_eq!(summary.duplicate_rows, 1);
    assert_eq!(summary.constant_columns, vec!["flat".to_string()]);
    assert_eq!(summary.outlier_rows, 0);
    assert!((summary.class_fraction("A") - 0.5).abs() < 1e-6);

    let report = summary.to_string();
    assert!(report.contains("Duplicated rows: 1"));
    assert!(report.contains("Class distribution (Family):"));
}

#[test]
fn test_summary_flags_outliers() {
    let mut values = vec![0.0f32; 50];
    values[49] = 1000.0;
    let features = ndarray::Array2::from_shape_vec((50, 1), values).unwrap();
    let labels = vec!["A".to_string(); 50];
    let table = FlowTable::new(vec!["x".to_string()], features, labels).unwrap();

    // One class only: the label column itself is constant
    let summary = summarize(&table, "Family", 4.0);
    assert_eq!(summary.outlier_rows, 1);
    assert_eq!(summary.constant_columns, vec!["Family".to_string()]);
}

#[test]
fn test_writer_output_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("synthetic.csv");

    let flow = FlowRecord {
        src_ip: "192.168.1.9".to_string(),
        dst_ip: "10.0.2.2".to_string(),
        duration: 50.0,
        protocol: 17,
        src_bytes: 1000.0,
        dst_bytes: 1000.0,
        packets: 10,
        tcp_flags: 0,
        active_time: 5.0,
        idle_time: 1.0,
    };

    let mut writer = DatasetWriter::create(&path).unwrap();
    writer.append(&flow, ThreatClass::Benign).unwrap();
    writer.append(&flow, ThreatClass::WannaCry).unwrap();
    assert_eq!(writer.finish().unwrap(), 2);

    let table = FlowTable::from_csv(&path, LABEL_COLUMN, None).unwrap();
    assert_eq!(table.n_features(), FEATURE_COUNT);
    assert_eq!(table.labels, vec!["Benign", "WannaCry"]);
    assert!((table.features[[0, 0]] - 0.5).abs() < 1e-6);
}
