// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users.
//! They should be protected by OIDC token verification in production.

use crate::error::AppError;
use crate::services::fetcher::ActivityFetcher;
use crate::services::predictor::Predictor;
use crate::services::tasks::{EtlTriggerPayload, FetchActivityPayload, PredictionPayload};
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/fetch-activity", post(fetch_activity))
        .route("/tasks/run-etl", post(run_etl))
        .route("/tasks/predict", post(predict))
}

/// Ensure the request comes from our Cloud Tasks queue.
///
/// Cloud Run strips this header from external requests, so its presence
/// guarantees internal origin. We also verify the queue name.
fn is_valid_queue(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get("x-cloudtasks-queuename")
        .and_then(|h| h.to_str().ok())
        .map(|name| name == crate::config::PIPELINE_QUEUE_NAME)
        .unwrap_or(false)
}

/// Fetch one activity's raw payloads (called by Cloud Tasks).
async fn fetch_activity(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<FetchActivityPayload>,
) -> StatusCode {
    if !is_valid_queue(&headers) {
        tracing::warn!(
            athlete_id = payload.athlete_id,
            activity_id = payload.activity_id,
            "Security Alert: Blocked unauthorized access to fetch_activity"
        );
        return StatusCode::FORBIDDEN;
    }

    tracing::info!(
        athlete_id = payload.athlete_id,
        activity_id = payload.activity_id,
        aspect_type = %payload.aspect_type,
        "Fetching activity from Cloud Task"
    );

    let fetcher = ActivityFetcher::new(
        state.strava.clone(),
        state.store.clone(),
        state.tasks.clone(),
        state.config.api_url.clone(),
    );

    match fetcher
        .fetch_activity(payload.athlete_id, payload.activity_id, &payload.aspect_type)
        .await
    {
        Ok(outcome) => {
            tracing::info!(
                activity_id = payload.activity_id,
                activity_stored = outcome.activity_stored,
                laps_stored = outcome.laps_stored,
                "Activity fetched"
            );
            StatusCode::OK
        }
        Err(AppError::TokenRefresh(athlete_id, msg)) => {
            // The athlete revoked access; retrying cannot help.
            tracing::warn!(athlete_id, error = %msg, "Dropping fetch for revoked athlete");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(
                activity_id = payload.activity_id,
                error = %e,
                "Failed to fetch activity"
            );
            // Return 500 to trigger Cloud Tasks retry
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run the ETL flow for a fetched activity (called by Cloud Tasks).
async fn run_etl(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<EtlTriggerPayload>,
) -> StatusCode {
    if !is_valid_queue(&headers) {
        tracing::warn!(
            athlete_id = payload.athlete_id,
            activity_id = payload.activity_id,
            "Security Alert: Blocked unauthorized access to run_etl"
        );
        return StatusCode::FORBIDDEN;
    }

    tracing::info!(
        athlete_id = payload.athlete_id,
        activity_id = payload.activity_id,
        activity_success = payload.activity_success,
        laps_success = payload.laps_success,
        "Running ETL from Cloud Task"
    );

    match crate::etl::run_flow(
        &state.store,
        &state.warehouse,
        payload.athlete_id,
        payload.activity_id,
    )
    .await
    {
        Ok(()) => StatusCode::OK,
        Err(AppError::NotFound(what)) => {
            // A raw document never arrived (the fetch reported a partial
            // failure); retrying won't produce it.
            tracing::warn!(
                activity_id = payload.activity_id,
                missing = %what,
                "Skipping ETL, raw document absent"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(
                activity_id = payload.activity_id,
                error = %e,
                "ETL flow failed"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Predict and annotate a fetched activity (called by Cloud Tasks).
async fn predict(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<PredictionPayload>,
) -> StatusCode {
    if !is_valid_queue(&headers) {
        tracing::warn!(
            athlete_id = payload.athlete_id,
            activity_id = payload.activity_id,
            "Security Alert: Blocked unauthorized access to predict"
        );
        return StatusCode::FORBIDDEN;
    }

    let predictor = Predictor::new(
        state.store.clone(),
        state.warehouse.clone(),
        state.strava.clone(),
    );

    match predictor
        .annotate_activity(payload.athlete_id, payload.activity_id, payload.features)
        .await
    {
        Ok(label) => {
            tracing::info!(
                activity_id = payload.activity_id,
                label,
                "Prediction applied"
            );
            StatusCode::OK
        }
        Err(AppError::NotFound(what)) => {
            // No artifacts yet; the task would fail forever until a
            // training run happens, so drop it.
            tracing::warn!(missing = %what, "Skipping prediction, artifacts absent");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(
                activity_id = payload.activity_id,
                error = %e,
                "Prediction failed"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
