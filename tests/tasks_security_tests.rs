// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security tests for the Cloud Tasks callback endpoints.
//!
//! Every /tasks/* endpoint must reject requests that don't carry the
//! queue-name header Cloud Run injects for internal Cloud Tasks calls.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

async fn post_task(
    app: axum::Router,
    uri: &str,
    queue_header: Option<&str>,
    payload: serde_json::Value,
) -> StatusCode {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");

    if let Some(queue) = queue_header {
        builder = builder.header("x-cloudtasks-queuename", queue);
    }

    let response = app
        .oneshot(
            builder
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    response.status()
}

#[tokio::test]
async fn fetch_activity_without_queue_header_is_forbidden() {
    let (app, _state) = common::create_test_app();

    let status = post_task(
        app,
        "/tasks/fetch-activity",
        None,
        json!({"athlete_id": 1, "activity_id": 2, "aspect_type": "create"}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn fetch_activity_with_wrong_queue_is_forbidden() {
    let (app, _state) = common::create_test_app();

    let status = post_task(
        app,
        "/tasks/fetch-activity",
        Some("some-other-queue"),
        json!({"athlete_id": 1, "activity_id": 2, "aspect_type": "create"}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn run_etl_without_queue_header_is_forbidden() {
    let (app, _state) = common::create_test_app();

    let status = post_task(
        app,
        "/tasks/run-etl",
        None,
        json!({
            "athlete_id": 1,
            "activity_id": 2,
            "activity_success": true,
            "laps_success": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn predict_without_queue_header_is_forbidden() {
    let (app, _state) = common::create_test_app();

    let status = post_task(
        app,
        "/tasks/predict",
        None,
        json!({
            "athlete_id": 1,
            "activity_id": 2,
            "features": [8000.0, 2400.0, 40.0]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn fetch_activity_with_correct_queue_passes_the_gate() {
    let (app, _state) = common::create_test_app();

    // With the right queue header the handler runs; the offline Strava
    // probe fails upstream, which maps to a retryable 500 rather than
    // the 403 gate.
    let status = post_task(
        app,
        "/tasks/fetch-activity",
        Some("strava-pipeline"),
        json!({"athlete_id": 1, "activity_id": 2, "aspect_type": "create"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
