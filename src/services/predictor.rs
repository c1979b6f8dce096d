// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Prediction stage: score runs against the stored model artifacts.
//!
//! Covers three consumers of the same scale-then-predict path:
//! - the push task that annotates a freshly fetched activity
//! - the backfill labeler that scores the whole clustering dataset
//! - the latest-run labeler behind the admin route

use crate::db::{warehouse::CLUSTERING_LABELS_TABLE, FirestoreStore, Warehouse};
use crate::error::{AppError, Result};
use crate::etl::frame::{Cell, Frame};
use crate::ml::{run_type, KMeansModel, StandardScaler};
use crate::services::StravaService;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Marker used to detect if an activity has already been annotated.
const ANNOTATION_MARKER: &str = "Predicted Run Type:";

/// The latest warehoused run with its predicted label.
#[derive(Debug, Clone, Serialize)]
pub struct LatestRunLabel {
    pub activity_id: i64,
    pub start_date: DateTime<Utc>,
    pub run_type: &'static str,
}

/// Scores runs with the persisted scaler and k-means artifacts.
pub struct Predictor {
    store: FirestoreStore,
    warehouse: Warehouse,
    strava: StravaService,
}

impl Predictor {
    pub fn new(store: FirestoreStore, warehouse: Warehouse, strava: StravaService) -> Self {
        Self {
            store,
            warehouse,
            strava,
        }
    }

    /// Load both artifacts, or fail if training has never run.
    async fn load_artifacts(&self) -> Result<(StandardScaler, KMeansModel)> {
        let scaler = self
            .store
            .get_scaler()
            .await?
            .ok_or_else(|| AppError::NotFound("scaler artifact (train first)".to_string()))?;
        let model = self
            .store
            .get_kmeans()
            .await?
            .ok_or_else(|| AppError::NotFound("kmeans artifact (train first)".to_string()))?;
        Ok((scaler, model))
    }

    /// Predict the run type for one raw feature vector.
    pub async fn predict_run_type(&self, features: [f64; 3]) -> Result<&'static str> {
        let (scaler, model) = self.load_artifacts().await?;
        Ok(predict_with(&scaler, &model, features))
    }

    /// Predict an activity's run type and prepend it to the activity
    /// description on Strava.
    ///
    /// Idempotent: an activity whose description already carries the
    /// annotation marker is left alone, so task retries do not stack
    /// labels.
    pub async fn annotate_activity(
        &self,
        athlete_id: u64,
        activity_id: u64,
        features: [f64; 3],
    ) -> Result<&'static str> {
        let label = self.predict_run_type(features).await?;

        let raw = self.strava.get_activity_raw(athlete_id, activity_id).await?;
        let existing = raw
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("");

        if existing.contains(ANNOTATION_MARKER) {
            tracing::info!(activity_id, "Activity already annotated, skipping");
            return Ok(label);
        }

        let description = if existing.is_empty() {
            format!("{} {}", ANNOTATION_MARKER, label)
        } else {
            format!("{} {}\n\n{}", ANNOTATION_MARKER, label, existing)
        };

        self.strava
            .update_activity_description(athlete_id, activity_id, &description)
            .await?;

        tracing::info!(athlete_id, activity_id, label, "Activity annotated");
        Ok(label)
    }

    /// Score every eligible clustering row and upsert the labels table.
    ///
    /// Returns the number of rows labeled.
    pub async fn backfill_labels(&self) -> Result<usize> {
        let (scaler, model) = self.load_artifacts().await?;
        let rows = self.warehouse.label_rows().await?;
        if rows.is_empty() {
            tracing::warn!("No eligible rows to label");
            return Ok(0);
        }

        let mut frame = Frame::new(vec![
            "id".to_string(),
            "distance".to_string(),
            "moving_time".to_string(),
            "suffer_score".to_string(),
            "run_type".to_string(),
        ]);

        for row in &rows {
            let label = predict_with(&scaler, &model, row.features);
            frame.push_row(vec![
                Cell::Int(row.id),
                Cell::Float(row.features[0]),
                Cell::Float(row.features[1]),
                Cell::Float(row.features[2]),
                Cell::Text(label.to_string()),
            ]);
        }

        self.warehouse
            .merge_frame(CLUSTERING_LABELS_TABLE, &["id"], &frame)
            .await?;

        tracing::info!(rows = rows.len(), "Backfilled run-type labels");
        Ok(rows.len())
    }

    /// Label the most recent warehoused run and record it in the
    /// labels table.
    pub async fn label_latest(&self) -> Result<LatestRunLabel> {
        let latest = self
            .warehouse
            .latest_activity()
            .await?
            .ok_or_else(|| AppError::NotFound("no activities in warehouse".to_string()))?;

        let features = match (latest.distance, latest.moving_time, latest.suffer_score) {
            (Some(d), Some(m), Some(s)) => [d, m, s],
            _ => {
                return Err(AppError::BadRequest(format!(
                    "latest activity {} is missing clustering features",
                    latest.id
                )))
            }
        };

        let label = self.predict_run_type(features).await?;

        let mut frame = Frame::new(vec![
            "id".to_string(),
            "distance".to_string(),
            "moving_time".to_string(),
            "suffer_score".to_string(),
            "run_type".to_string(),
        ]);
        frame.push_row(vec![
            Cell::Int(latest.id),
            Cell::Float(features[0]),
            Cell::Float(features[1]),
            Cell::Float(features[2]),
            Cell::Text(label.to_string()),
        ]);
        self.warehouse
            .merge_frame(CLUSTERING_LABELS_TABLE, &["id"], &frame)
            .await?;

        tracing::info!(activity_id = latest.id, label, "Latest run labeled");
        Ok(LatestRunLabel {
            activity_id: latest.id,
            start_date: latest.start_date,
            run_type: label,
        })
    }
}

fn predict_with(scaler: &StandardScaler, model: &KMeansModel, features: [f64; 3]) -> &'static str {
    let row = ndarray::arr2(&[features]);
    let scaled = scaler.transform(row.view());
    let cluster = model.predict_one(scaled.row(0));
    run_type(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{CLUSTER_LABELS, MAX_ITERATIONS, NUM_CLUSTERS, RANDOM_SEED};
    use ndarray::array;

    #[test]
    fn predict_with_returns_a_known_label() {
        let data = array![
            [1000.0, 600.0, 5.0],
            [1100.0, 650.0, 6.0],
            [8000.0, 2400.0, 40.0],
            [8200.0, 2500.0, 42.0],
            [20000.0, 7200.0, 120.0],
            [21000.0, 7400.0, 130.0],
            [15000.0, 4000.0, 80.0],
            [15500.0, 4100.0, 85.0],
        ];
        let scaler = StandardScaler::fit(data.view());
        let scaled = scaler.transform(data.view());
        let model =
            KMeansModel::fit(scaled.view(), NUM_CLUSTERS, RANDOM_SEED, MAX_ITERATIONS).unwrap();

        let label = predict_with(&scaler, &model, [1050.0, 620.0, 5.5]);
        assert!(CLUSTER_LABELS.contains(&label));
    }

    #[tokio::test]
    async fn predicting_without_artifacts_fails() {
        use crate::services::RefreshLocks;
        use dashmap::DashMap;
        use std::sync::Arc;

        let store = FirestoreStore::new_mock();
        let strava = StravaService::new(
            "id".to_string(),
            "secret".to_string(),
            store.clone(),
            Arc::new(DashMap::new()) as RefreshLocks,
        );
        let predictor = Predictor::new(store, Warehouse::new_mock(), strava);

        // Mock store is offline; either way no artifacts come back.
        let err = predictor
            .predict_run_type([1000.0, 600.0, 5.0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Storage(_) | AppError::NotFound(_)
        ));
    }
}
