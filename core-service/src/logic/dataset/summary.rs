//! Dataset Summary
//!
//! Quick health report before training: class balance, duplicates,
//! constant columns and extreme outliers.

use std::collections::{BTreeMap, HashSet};

use ndarray::Axis;
use serde::{Deserialize, Serialize};

use super::FlowTable;

/// Default |z| above which a row counts as an outlier
pub const DEFAULT_Z_THRESHOLD: f32 = 4.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub label_column: String,
    pub rows: usize,
    pub feature_columns: usize,
    pub class_counts: BTreeMap<String, usize>,
    pub duplicate_rows: usize,
    pub constant_columns: Vec<String>,
    pub outlier_rows: usize,
    pub z_threshold: f32,
}

impl DatasetSummary {
    pub fn class_fraction(&self, label: &str) -> f32 {
        if self.rows == 0 {
            return 0.0;
        }
        self.class_counts.get(label).copied().unwrap_or(0) as f32 / self.rows as f32
    }
}

pub fn summarize(table: &FlowTable, label_column: &str, z_threshold: f32) -> DatasetSummary {
    // Duplicates: identical features and label, counted after the first
    let mut seen = HashSet::with_capacity(table.len());
    let mut duplicate_rows = 0;
    for (row, label) in table.features.axis_iter(Axis(0)).zip(&table.labels) {
        let key: (Vec<u32>, &str) = (row.iter().map(|v| v.to_bits()).collect(), label.as_str());
        if !seen.insert(key) {
            duplicate_rows += 1;
        }
    }

    let mut constant_columns = Vec::new();
    let mut z_stats = Vec::with_capacity(table.n_features());
    for (name, column) in table.feature_names.iter().zip(table.features.axis_iter(Axis(1))) {
        let first = column.first().copied();
        if column.iter().all(|&v| Some(v) == first) {
            constant_columns.push(name.clone());
        }

        let n = column.len().max(1) as f64;
        let mean = column.iter().map(|&v| v as f64).sum::<f64>() / n;
        let std = (column.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n).sqrt();
        z_stats.push((mean, std));
    }

    let class_counts = table.class_counts();
    if class_counts.len() == 1 {
        constant_columns.push(label_column.to_string());
    }

    let threshold = z_threshold as f64;
    let outlier_rows = table
        .features
        .axis_iter(Axis(0))
        .filter(|row| {
            row.iter().zip(&z_stats).any(|(&v, &(mean, std))| {
                // Constant columns have no z-score
                std > 0.0 && ((v as f64 - mean) / std).abs() > threshold
            })
        })
        .count();

    DatasetSummary {
        label_column: label_column.to_string(),
        rows: table.len(),
        feature_columns: table.n_features(),
        class_counts,
        duplicate_rows,
        constant_columns,
        outlier_rows,
        z_threshold,
    }
}

impl std::fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- Dataset Overview ---")?;
        writeln!(f, "Rows: {}  Feature columns: {}", self.rows, self.feature_columns)?;
        writeln!(f)?;
        writeln!(f, "Class distribution ({}):", self.label_column)?;
        for (label, count) in &self.class_counts {
            writeln!(f, "  {:<15} {:>8}  ({:.4})", label, count, self.class_fraction(label))?;
        }
        writeln!(f)?;
        writeln!(f, "Duplicated rows: {}", self.duplicate_rows)?;
        if self.duplicate_rows > 0 {
            writeln!(f, "Consider removing duplicates for better model accuracy.")?;
        }
        if self.constant_columns.is_empty() {
            writeln!(f, "No constant columns found.")?;
        } else {
            writeln!(f, "Constant columns (no variance): {}", self.constant_columns.join(", "))?;
        }
        write!(
            f,
            "Rows with extreme outliers (z > {}): {}",
            self.z_threshold, self.outlier_rows
        )
    }
}
