// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes for manually driving the model side of the pipeline.
//!
//! These are operator endpoints, deployed behind Cloud Run IAM rather
//! than application-level auth.

use crate::error::Result;
use crate::services::predictor::{LatestRunLabel, Predictor};
use crate::services::trainer::{self, TrainOutcome};
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Admin routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/preprocess", post(preprocess))
        .route("/admin/train", post(train))
        .route("/admin/backfill-labels", post(backfill_labels))
        .route("/admin/label-latest", post(label_latest))
}

#[derive(Serialize)]
struct PreprocessResponse {
    rows: u64,
}

/// Rebuild the clustering dataset from the warehoused activities.
async fn preprocess(State(state): State<Arc<AppState>>) -> Result<Json<PreprocessResponse>> {
    let rows = state.warehouse.rebuild_clustering_data().await?;
    tracing::info!(rows, "Clustering dataset rebuilt");
    Ok(Json(PreprocessResponse { rows }))
}

#[derive(Serialize)]
struct TrainResponse {
    trained: bool,
    samples: usize,
}

/// Fit fresh model artifacts from the clustering dataset
/// (run /admin/preprocess first to rebuild it).
async fn train(State(state): State<Arc<AppState>>) -> Result<Json<TrainResponse>> {
    let response = match trainer::train(&state.store, &state.warehouse).await? {
        TrainOutcome::NoData => TrainResponse {
            trained: false,
            samples: 0,
        },
        TrainOutcome::Trained { samples } => TrainResponse {
            trained: true,
            samples,
        },
    };
    Ok(Json(response))
}

#[derive(Serialize)]
struct BackfillResponse {
    labeled: usize,
}

/// Score every eligible clustering row into the labels table.
async fn backfill_labels(State(state): State<Arc<AppState>>) -> Result<Json<BackfillResponse>> {
    let predictor = Predictor::new(
        state.store.clone(),
        state.warehouse.clone(),
        state.strava.clone(),
    );
    let labeled = predictor.backfill_labels().await?;
    Ok(Json(BackfillResponse { labeled }))
}

/// Label the most recent warehoused run.
async fn label_latest(State(state): State<Arc<AppState>>) -> Result<Json<LatestRunLabel>> {
    let predictor = Predictor::new(
        state.store.clone(),
        state.warehouse.clone(),
        state.strava.clone(),
    );
    let label = predictor.label_latest().await?;
    Ok(Json(label))
}
