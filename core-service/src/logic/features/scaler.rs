//! Standard Scaler
//!
//! Per-column zero-mean / unit-variance scaling fitted on the training table.
//! Population std; constant columns keep scale 1 so they map to 0.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

#[derive(Debug)]
pub struct ScalerError(pub String);

impl std::fmt::Display for ScalerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScalerError: {}", self.0)
    }
}

impl std::error::Error for ScalerError {}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.mean.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Learn column statistics
    pub fn fit(&mut self, data: ArrayView2<'_, f32>) -> Result<(), ScalerError> {
        if data.nrows() == 0 {
            return Err(ScalerError("cannot fit on an empty table".to_string()));
        }

        let n = data.nrows() as f64;
        let mut mean = Vec::with_capacity(data.ncols());
        let mut scale = Vec::with_capacity(data.ncols());

        for column in data.axis_iter(Axis(1)) {
            // f64 accumulation: byte counters reach 1e4-1e5
            let mu = column.iter().map(|&v| v as f64).sum::<f64>() / n;
            let var = column.iter().map(|&v| (v as f64 - mu).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();

            mean.push(mu as f32);
            scale.push(if std > 0.0 { std as f32 } else { 1.0 });
        }

        self.mean = mean;
        self.scale = scale;
        Ok(())
    }

    /// Apply learned statistics
    pub fn transform(&self, data: ArrayView2<'_, f32>) -> Result<Array2<f32>, ScalerError> {
        if !self.is_fitted() {
            return Err(ScalerError("scaler not fitted".to_string()));
        }
        if data.ncols() != self.n_features() {
            return Err(ScalerError(format!(
                "expected {} columns, got {}",
                self.n_features(),
                data.ncols()
            )));
        }

        let mut out = data.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mu, sigma) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - mu) / sigma);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, data: ArrayView2<'_, f32>) -> Result<Array2<f32>, ScalerError> {
        self.fit(data)?;
        self.transform(data)
    }
}
