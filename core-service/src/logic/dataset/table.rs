use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::DatasetError;

/// Numeric feature table with one string label per row
#[derive(Debug, Clone, PartialEq)]
pub struct FlowTable {
    pub feature_names: Vec<String>,
    /// rows x features
    pub features: Array2<f32>,
    pub labels: Vec<String>,
}

impl FlowTable {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f32>,
        labels: Vec<String>,
    ) -> Result<Self, DatasetError> {
        if features.nrows() != labels.len() {
            return Err(DatasetError::Shape(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if features.ncols() != feature_names.len() {
            return Err(DatasetError::Shape(format!(
                "{} feature columns but {} names",
                features.ncols(),
                feature_names.len()
            )));
        }

        Ok(Self { feature_names, features, labels })
    }

    /// Read a CSV with a header row; `label_column` holds the class,
    /// every other column must be numeric.
    pub fn from_csv(path: &Path, label_column: &str, nrows: Option<usize>) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let label_idx = headers
            .iter()
            .position(|h| h == label_column)
            .ok_or_else(|| DatasetError::MissingLabel(label_column.to_string()))?;

        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label_idx)
            .map(|(_, h)| h.to_string())
            .collect();

        let mut values = Vec::new();
        let mut labels = Vec::new();

        for (row_idx, result) in reader.records().enumerate() {
            if nrows.is_some_and(|limit| row_idx >= limit) {
                break;
            }
            let record = result?;

            for (col_idx, cell) in record.iter().enumerate() {
                if col_idx == label_idx {
                    labels.push(cell.to_string());
                    continue;
                }
                let value: f32 = cell.parse().map_err(|_| DatasetError::Parse {
                    // 1-based, header is line 1
                    row: row_idx + 2,
                    column: headers.get(col_idx).unwrap_or("?").to_string(),
                    value: cell.to_string(),
                })?;
                values.push(value);
            }
        }

        if labels.is_empty() {
            return Err(DatasetError::Empty(path.to_path_buf()));
        }

        let features = Array2::from_shape_vec((labels.len(), feature_names.len()), values)
            .map_err(|e| DatasetError::Shape(e.to_string()))?;

        Self::new(feature_names, features, labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Rows per label, sorted by label
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// New table with the given rows, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }

    /// Class-proportional subsample of at most `max_samples` rows
    ///
    /// Quotas use largest-remainder rounding so the total is exact; the
    /// selected rows come back shuffled.
    pub fn stratified_sample(&self, max_samples: usize, seed: u64) -> Self {
        if self.len() <= max_samples {
            return self.clone();
        }

        let mut rng = StdRng::seed_from_u64(seed);

        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, label) in self.labels.iter().enumerate() {
            groups.entry(label.as_str()).or_default().push(i);
        }

        let total = self.len();
        let mut quotas: Vec<(usize, usize)> = Vec::with_capacity(groups.len()); // (quota, remainder)
        for rows in groups.values() {
            let exact = rows.len() * max_samples;
            quotas.push((exact / total, exact % total));
        }

        let assigned: usize = quotas.iter().map(|(q, _)| q).sum();
        let mut order: Vec<usize> = (0..quotas.len()).collect();
        order.sort_by(|&a, &b| quotas[b].1.cmp(&quotas[a].1).then(a.cmp(&b)));
        for &g in order.iter().take(max_samples - assigned) {
            quotas[g].0 += 1;
        }

        let mut selected = Vec::with_capacity(max_samples);
        for (rows, (quota, _)) in groups.into_values().zip(quotas) {
            let mut rows = rows;
            rows.shuffle(&mut rng);
            selected.extend(rows.into_iter().take(quota));
        }
        selected.shuffle(&mut rng);

        log::info!("Using {} samples for training (stratified)", selected.len());
        self.select(&selected)
    }
}
