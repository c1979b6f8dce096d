// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Standard scaler: zero mean, unit variance per feature.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted per-feature mean and scale, serialized as a model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit the scaler on a samples-by-features matrix.
    ///
    /// Uses the population standard deviation; a constant feature gets
    /// scale 1 so transforming it yields zeros rather than NaN.
    pub fn fit(data: ArrayView2<f64>) -> Self {
        let n = data.nrows() as f64;
        let mean: Vec<f64> = data
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_default();

        let scale: Vec<f64> = (0..data.ncols())
            .map(|j| {
                let m = mean[j];
                let var = data.column(j).iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std == 0.0 {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Self { mean, scale }
    }

    /// Transform a samples-by-features matrix into scaled space.
    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            for (j, x) in row.iter_mut().enumerate() {
                *x = (*x - self.mean[j]) / self.scale[j];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fitted_transform_has_zero_mean_unit_variance() {
        let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = StandardScaler::fit(data.view());
        let scaled = scaler.transform(data.view());

        for j in 0..2 {
            let col = scaled.column(j);
            let mean = col.sum() / col.len() as f64;
            let var = col.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-9);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn constant_feature_scales_to_zero_not_nan() {
        let data = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaler = StandardScaler::fit(data.view());
        let scaled = scaler.transform(data.view());

        for x in scaled.column(0) {
            assert_eq!(*x, 0.0);
        }
    }

    #[test]
    fn round_trips_through_serde() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let scaler = StandardScaler::fit(data.view());

        let json = serde_json::to_string(&scaler).unwrap();
        let restored: StandardScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.mean, scaler.mean);
        assert_eq!(restored.scale, scaler.scale);
    }
}
