// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Model training stage.
//!
//! Reads the clustering dataset as-is (rebuilding it is the separate
//! preprocessing trigger), fits the scaler and the k-means model, and
//! persists both artifacts. The fixed seed makes retraining on the
//! same data reproduce the same centroids, which is what keeps the
//! cluster-to-label map stable.

use crate::db::{FirestoreStore, Warehouse};
use crate::error::{AppError, Result};
use crate::ml::{KMeansModel, StandardScaler, MAX_ITERATIONS, NUM_CLUSTERS, RANDOM_SEED};
use ndarray::Array2;

/// Outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainOutcome {
    /// The clustering dataset was empty; no artifacts were written.
    NoData,
    /// Both artifacts were fitted and persisted.
    Trained { samples: usize },
}

/// Fit fresh model artifacts from the clustering dataset.
pub async fn train(store: &FirestoreStore, warehouse: &Warehouse) -> Result<TrainOutcome> {
    let features = warehouse.clustering_features().await?;

    let Some((scaler, model)) = fit_artifacts(&features)? else {
        tracing::warn!("Clustering dataset is empty, skipping training");
        return Ok(TrainOutcome::NoData);
    };

    store.set_scaler(&scaler).await?;
    store.set_kmeans(&model).await?;

    tracing::info!(
        samples = features.len(),
        clusters = NUM_CLUSTERS,
        "Model artifacts trained and stored"
    );
    Ok(TrainOutcome::Trained {
        samples: features.len(),
    })
}

/// Fit both artifacts from the feature rows, or nothing when the set
/// is empty.
fn fit_artifacts(features: &[[f64; 3]]) -> Result<Option<(StandardScaler, KMeansModel)>> {
    if features.is_empty() {
        return Ok(None);
    }

    let data = feature_matrix(features)?;
    let scaler = StandardScaler::fit(data.view());
    let scaled = scaler.transform(data.view());
    let model = KMeansModel::fit(scaled.view(), NUM_CLUSTERS, RANDOM_SEED, MAX_ITERATIONS)?;
    Ok(Some((scaler, model)))
}

fn feature_matrix(features: &[[f64; 3]]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = features.iter().flatten().copied().collect();
    Array2::from_shape_vec((features.len(), 3), flat)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Feature matrix shape error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_matrix_keeps_row_order() {
        let rows = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let matrix = feature_matrix(&rows).unwrap();

        assert_eq!(matrix.nrows(), 2);
        assert_eq!(matrix[[0, 0]], 1.0);
        assert_eq!(matrix[[1, 2]], 6.0);
    }

    #[test]
    fn empty_feature_set_fits_nothing() {
        assert!(fit_artifacts(&[]).unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_dataset_is_no_data_and_writes_no_artifacts() {
        // The store is offline, so any artifact write would error out;
        // a clean NoData proves nothing was persisted.
        let store = FirestoreStore::new_mock();
        let warehouse = Warehouse::new_fake(vec![]);

        let outcome = train(&store, &warehouse).await.unwrap();
        assert_eq!(outcome, TrainOutcome::NoData);
    }

    #[tokio::test]
    async fn non_empty_dataset_attempts_artifact_writes() {
        let store = FirestoreStore::new_mock();
        let warehouse = Warehouse::new_fake(vec![
            [1000.0, 600.0, 5.0],
            [8000.0, 2400.0, 40.0],
            [20000.0, 7200.0, 120.0],
            [15000.0, 4000.0, 80.0],
        ]);

        // Fitting succeeds; the offline store rejects the first write.
        let err = train(&store, &warehouse).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn mock_warehouse_rejects_training() {
        let store = FirestoreStore::new_mock();
        let warehouse = Warehouse::new_mock();

        let err = train(&store, &warehouse).await.unwrap_err();
        assert!(matches!(err, AppError::Warehouse(_)));
    }
}
